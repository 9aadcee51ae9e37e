//! CLI command implementations.

pub mod migrate;
pub mod orders;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by the commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Order store error.
    #[error("Order store error: {0}")]
    Store(#[from] order_processor_server::db::StoreError),

    /// Order document could not be printed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No order with the requested number.
    #[error("Order {0} not found")]
    OrderNotFound(i64),
}

/// Order database URL, with fallback to generic `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("ORDERS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("ORDERS_DATABASE_URL"))
}
