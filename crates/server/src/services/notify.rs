//! Order confirmation emails.
//!
//! Every finalized order produces two messages: a thank-you to the customer and
//! a notification to the shop. Both are rendered from a per-line-item template
//! and an outer template, in HTML and plain text. Delivery runs on its own task
//! and never changes the outcome of a finalization.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use thiserror::Error;
use tokio::task::JoinHandle;

use order_processor_core::{Order, OrderNumber, PricedLineItem};

use super::email::{Address, MailError, MailMessage, Mailer};

/// Subject of the customer's thank-you email.
pub const CUSTOMER_SUBJECT: &str = "Vielen Dank für Ihre Bestellung.";

/// Subject of the shop's new-order email.
#[must_use]
pub fn internal_subject(number: OrderNumber) -> String {
    format!("[#{number}] Neue Bestellung eingegangen.")
}

#[derive(Template)]
#[template(path = "email/line_item.html")]
struct LineItemHtml<'a> {
    line: &'a PricedLineItem,
}

#[derive(Template)]
#[template(path = "email/line_item.txt")]
struct LineItemText<'a> {
    line: &'a PricedLineItem,
}

#[derive(Template)]
#[template(path = "email/customer_order.html")]
struct CustomerOrderHtml<'a> {
    order: &'a Order,
    salutation: &'a str,
    shop_name: &'a str,
    product_list: &'a str,
}

#[derive(Template)]
#[template(path = "email/customer_order.txt")]
struct CustomerOrderText<'a> {
    order: &'a Order,
    salutation: &'a str,
    shop_name: &'a str,
    product_list: &'a str,
}

#[derive(Template)]
#[template(path = "email/internal_order.html")]
struct InternalOrderHtml<'a> {
    order: &'a Order,
    placed_at: &'a str,
    product_list: &'a str,
}

#[derive(Template)]
#[template(path = "email/internal_order.txt")]
struct InternalOrderText<'a> {
    order: &'a Order,
    placed_at: &'a str,
    product_list: &'a str,
}

/// Errors delivering one notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("template error: {0}")]
    Render(#[from] askama::Error),

    #[error(transparent)]
    Mail(#[from] MailError),

    #[error("mail delivery timed out after {0:?}")]
    TimedOut(Duration),
}

/// Outcome of the notifications for one order.
#[derive(Debug)]
pub struct NotificationReport {
    pub order_number: OrderNumber,
    pub customer: Result<(), NotificationError>,
    pub internal: Result<(), NotificationError>,
}

impl NotificationReport {
    /// Whether both messages were handed to the relay.
    #[must_use]
    pub const fn all_sent(&self) -> bool {
        self.customer.is_ok() && self.internal.is_ok()
    }
}

/// Rendered bodies of one message.
struct Rendered {
    text: String,
    html: String,
}

/// Render the line item rows of an order in both formats.
fn render_product_lists(lines: &[PricedLineItem]) -> Result<Rendered, askama::Error> {
    let mut html = String::new();
    let mut text = String::new();
    for line in lines {
        html.push_str(&LineItemHtml { line }.render()?);
        html.push('\n');
        text.push_str(&LineItemText { line }.render()?);
        text.push('\n');
    }
    Ok(Rendered { text, html })
}

fn render_customer(order: &Order, shop_name: &str) -> Result<Rendered, askama::Error> {
    let products = render_product_lists(&order.lines)?;
    let salutation = order.customer.salutation();
    Ok(Rendered {
        text: CustomerOrderText {
            order,
            salutation,
            shop_name,
            product_list: &products.text,
        }
        .render()?,
        html: CustomerOrderHtml {
            order,
            salutation,
            shop_name,
            product_list: &products.html,
        }
        .render()?,
    })
}

fn render_internal(order: &Order) -> Result<Rendered, askama::Error> {
    let products = render_product_lists(&order.lines)?;
    let placed_at = order.header.date.format("%d.%m.%Y %H:%M UTC").to_string();
    Ok(Rendered {
        text: InternalOrderText {
            order,
            placed_at: &placed_at,
            product_list: &products.text,
        }
        .render()?,
        html: InternalOrderHtml {
            order,
            placed_at: &placed_at,
            product_list: &products.html,
        }
        .render()?,
    })
}

/// Renders and sends the confirmation emails of finalized orders.
#[derive(Clone)]
pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    sender: Address,
    shop_recipient: Address,
    timeout: Duration,
}

impl NotificationDispatcher {
    #[must_use]
    pub fn new(
        mailer: Arc<dyn Mailer>,
        sender: Address,
        shop_recipient: Address,
        timeout: Duration,
    ) -> Self {
        Self {
            mailer,
            sender,
            shop_recipient,
            timeout,
        }
    }

    /// Send the notifications of `order` on a background task.
    pub fn spawn(&self, order: Order) -> JoinHandle<NotificationReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(&order).await })
    }

    /// Send both notifications of `order` and report what happened.
    ///
    /// Failures are logged here; nothing is propagated.
    #[tracing::instrument(skip_all, fields(order_number = %order.number()))]
    pub async fn dispatch(&self, order: &Order) -> NotificationReport {
        let customer_recipient = Address::new(
            order.customer.billing_name.clone(),
            order.customer.billing_email.as_str(),
        );

        let customer = match render_customer(order, &self.sender.name) {
            Ok(bodies) => self.deliver(customer_recipient, CUSTOMER_SUBJECT.to_owned(), bodies).await,
            Err(e) => Err(e.into()),
        };
        let internal = match render_internal(order) {
            Ok(bodies) => {
                self.deliver(self.shop_recipient.clone(), internal_subject(order.number()), bodies)
                    .await
            }
            Err(e) => Err(e.into()),
        };

        if let Err(e) = &customer {
            tracing::warn!(error = %e, "Customer confirmation email failed");
        }
        if let Err(e) = &internal {
            tracing::warn!(error = %e, "Shop notification email failed");
        }

        NotificationReport {
            order_number: order.number(),
            customer,
            internal,
        }
    }

    async fn deliver(
        &self,
        to: Address,
        subject: String,
        bodies: Rendered,
    ) -> Result<(), NotificationError> {
        let message = MailMessage {
            from: self.sender.clone(),
            to,
            subject,
            text_body: bodies.text,
            html_body: bodies.html,
        };

        tokio::time::timeout(self.timeout, self.mailer.send(&message))
            .await
            .map_err(|_| NotificationError::TimedOut(self.timeout))??;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use order_processor_core::{OrderDraft, OrderFormInput, OrderTotals, format_price};

    use super::*;
    use crate::memory::MemoryMailer;

    fn line(brand_id: &str, quantity: u64, price: Decimal) -> PricedLineItem {
        let total = price * Decimal::from(quantity);
        PricedLineItem {
            sort_key: format!("{brand_id}/1/professional"),
            brand: brand_id.to_uppercase(),
            brand_id: brand_id.to_owned(),
            model: "64625 HLX".to_owned(),
            model_id: "1".to_owned(),
            quantity,
            tier: "professional".to_owned(),
            tier_display: "Professional Line".to_owned(),
            price,
            price_display: format_price(price),
            original_price: price,
            original_price_display: format_price(price),
            picture: String::new(),
            line_total: total,
            line_total_display: format_price(total),
            delivery_time: "1-2 Tage".to_owned(),
        }
    }

    fn order() -> Order {
        let customer = OrderFormInput {
            billing_title: "Herr".to_owned(),
            billing_name: "Max <Mustermann>".to_owned(),
            billing_email: "max@example.de".to_owned(),
            billing_street: "Hauptstraße 1".to_owned(),
            billing_zip: "10115".to_owned(),
            billing_city: "Berlin".to_owned(),
            options_payment_method: "invoice".to_owned(),
            options_shipping_method: "dhl-standard".to_owned(),
            options_use_billing_for_shipping: "on".to_owned(),
            options_cart_id: "cart-9".to_owned(),
            ..OrderFormInput::default()
        }
        .validate()
        .unwrap();

        OrderDraft {
            customer,
            lines: vec![line("a", 2, Decimal::new(4999, 2)), line("b", 1, Decimal::new(1250, 2))],
            totals: OrderTotals {
                subtotal: Decimal::new(11248, 2),
                tax: Decimal::new(2137, 2),
                shipping: Decimal::ZERO,
                grand_total: Decimal::new(11248, 2),
            },
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap(),
            shop: "lampen.example.de".to_owned(),
            client_ip: "203.0.113.9".to_owned(),
        }
        .with_number(OrderNumber::new(42))
    }

    fn dispatcher(mailer: Arc<MemoryMailer>) -> NotificationDispatcher {
        NotificationDispatcher::new(
            mailer,
            Address::new("Lampenwelt", "shop@example.de"),
            Address::new("Bestellungen", "orders@example.de"),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_internal_subject() {
        assert_eq!(
            internal_subject(OrderNumber::new(7)),
            "[#7] Neue Bestellung eingegangen."
        );
    }

    #[test]
    fn test_product_list_has_one_row_per_line() {
        let order = order();
        let rendered = render_product_lists(&order.lines).unwrap();
        assert_eq!(rendered.html.matches("<tr>").count(), 2);
        assert!(rendered.text.contains("2 x A 64625 HLX (Professional Line) à 49,99 EUR = 99,98 EUR"));
        assert!(rendered.text.contains("1 x B 64625 HLX"));
        assert_eq!(rendered.text.matches("Lieferzeit: 1-2 Tage\n").count(), 2);
        assert!(rendered.text.ends_with('\n'));
    }

    #[test]
    fn test_customer_email_bodies() {
        let rendered = render_customer(&order(), "Lampenwelt").unwrap();
        assert!(rendered.text.starts_with("Sehr geehrter Herr Max <Mustermann>,"));
        assert!(rendered.text.contains("#42"));
        assert!(rendered.text.contains("Gesamtsumme: 112,48 EUR"));
        assert!(rendered.text.contains("Wie Rechnungsadresse"));
        // HTML escapes customer input but not the rendered rows.
        assert!(!rendered.html.contains("Max <Mustermann>"));
        assert!(rendered.html.contains("<td style"));
    }

    #[test]
    fn test_internal_email_bodies() {
        let rendered = render_internal(&order()).unwrap();
        assert!(rendered.text.starts_with("Neue Bestellung #42"));
        assert!(rendered.text.contains("Eingegangen: 01.03.2026 10:30 UTC"));
        assert!(rendered.text.contains("Warenkorb: cart-9"));
        assert!(rendered.text.contains("IP: 203.0.113.9"));
    }

    #[tokio::test]
    async fn test_dispatch_sends_customer_and_shop_messages() {
        let mailer = Arc::new(MemoryMailer::new());
        let report = dispatcher(mailer.clone()).dispatch(&order()).await;

        assert!(report.all_sent());
        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to.email, "max@example.de");
        assert_eq!(sent[0].subject, CUSTOMER_SUBJECT);
        assert_eq!(sent[1].to.email, "orders@example.de");
        assert_eq!(sent[1].subject, "[#42] Neue Bestellung eingegangen.");
        assert!(sent.iter().all(|m| m.from.email == "shop@example.de"));
    }

    #[tokio::test]
    async fn test_failed_customer_email_still_sends_shop_message() {
        let mailer = Arc::new(MemoryMailer::new());
        mailer.fail_for("max@example.de");

        let report = dispatcher(mailer.clone()).dispatch(&order()).await;

        assert!(matches!(report.customer, Err(NotificationError::Mail(_))));
        assert!(report.internal.is_ok());
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_mailer_times_out() {
        let mailer = Arc::new(MemoryMailer::new());
        mailer.set_delay(Duration::from_secs(5));

        let report = dispatcher(mailer).spawn(order()).await.unwrap();

        assert!(matches!(report.customer, Err(NotificationError::TimedOut(_))));
        assert!(matches!(report.internal, Err(NotificationError::TimedOut(_))));
        assert_eq!(report.order_number, OrderNumber::new(42));
    }
}
