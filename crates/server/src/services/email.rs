//! Outbound mail delivery.
//!
//! Uses SMTP via lettre. Rendering lives in [`super::notify`]; this module only
//! turns a finished [`MailMessage`] into a multipart email and hands it to the relay.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::MailConfig;

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The message was not accepted for delivery.
    #[error("Mail delivery failed: {0}")]
    Delivery(String),
}

/// A named email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub name: String,
    pub email: String,
}

impl Address {
    #[must_use]
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    fn to_mailbox(&self) -> Result<Mailbox, MailError> {
        let email = self
            .email
            .parse()
            .map_err(|_| MailError::InvalidAddress(self.email.clone()))?;
        let name = Some(self.name.clone()).filter(|n| !n.is_empty());
        Ok(Mailbox::new(name, email))
    }
}

/// A rendered message with plain text and HTML bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: Address,
    pub to: Address,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Sends rendered messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// SMTP implementation of [`Mailer`].
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Create a new SMTP mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay host is invalid.
    pub fn new(config: &MailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self { transport })
    }
}

/// Build a multipart email with both plain text and HTML versions.
///
/// # Errors
///
/// Returns `MailError` if an address is invalid or the message cannot be built.
pub fn build_message(message: &MailMessage) -> Result<Message, MailError> {
    Ok(Message::builder()
        .from(message.from.to_mailbox()?)
        .to(message.to.to_mailbox()?)
        .subject(message.subject.as_str())
        .multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(message.text_body.clone()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(message.html_body.clone()),
                ),
        )?)
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let email = build_message(message)?;
        self.transport.send(email).await?;

        tracing::info!(to = %message.to.email, subject = %message.subject, "Email sent successfully");
        Ok(())
    }
}
