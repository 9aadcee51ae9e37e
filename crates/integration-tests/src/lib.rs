//! Integration tests for the order processor.
//!
//! The whole finalization pipeline runs against the in-memory collaborators
//! from `order_processor_server::memory`, so no Redis, `PostgreSQL` or SMTP
//! relay is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p order-processor-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `finalize_order` - Pipeline outcomes and side effects
//! - `http_api` - The HTTP surface as the storefront sees it

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;
use rust_decimal::Decimal;

use order_processor_core::catalog::VariantListing;
use order_processor_core::{CartId, CartLine, CatalogProduct, CompactCart, OrderFormInput};
use order_processor_server::config::PipelineConfig;
use order_processor_server::memory::{
    MemoryCartCache, MemoryCatalog, MemoryMailer, MemoryOrderStore,
};
use order_processor_server::services::email::Address;
use order_processor_server::services::{Collaborators, OrderPipeline, ShopIdentity};
use order_processor_server::state::AppState;

/// Origin the storefront posts from in these tests.
pub const STOREFRONT_ORIGIN: &str = "https://www.lampen.example.de";

/// Shop address the internal notification goes to.
pub const NOTIFY_EMAIL: &str = "orders@lampen.example.de";

/// A pipeline wired to in-memory collaborators the test can inspect.
pub struct TestContext {
    pub catalog: Arc<MemoryCatalog>,
    pub carts: Arc<MemoryCartCache>,
    pub store: Arc<MemoryOrderStore>,
    pub mailer: Arc<MemoryMailer>,
    pub pipeline: OrderPipeline,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// Fresh collaborators, short timeouts, 19% tax.
    #[must_use]
    pub fn new() -> Self {
        let catalog = Arc::new(MemoryCatalog::new());
        let carts = Arc::new(MemoryCartCache::new());
        let store = Arc::new(MemoryOrderStore::new());
        let mailer = Arc::new(MemoryMailer::new());

        let pipeline = OrderPipeline::new(
            Collaborators {
                catalog: catalog.clone(),
                carts: carts.clone(),
                store: store.clone(),
                mailer: mailer.clone(),
            },
            ShopIdentity {
                domain: "lampen.example.de".to_owned(),
                sender: Address::new("Lampenwelt", "shop@lampen.example.de"),
                notify: Address::new("Bestellungen", NOTIFY_EMAIL),
            },
            &PipelineConfig {
                tax_rate: Decimal::new(19, 2),
                mail_timeout: Duration::from_millis(500),
                ..PipelineConfig::default()
            },
        );

        Self {
            catalog,
            carts,
            store,
            mailer,
            pipeline,
        }
    }

    /// The full application router over a second pipeline sharing these collaborators.
    #[must_use]
    pub fn router(&self) -> Router {
        let pipeline = OrderPipeline::new(
            Collaborators {
                catalog: self.catalog.clone(),
                carts: self.carts.clone(),
                store: self.store.clone(),
                mailer: self.mailer.clone(),
            },
            ShopIdentity {
                domain: "lampen.example.de".to_owned(),
                sender: Address::new("Lampenwelt", "shop@lampen.example.de"),
                notify: Address::new("Bestellungen", NOTIFY_EMAIL),
            },
            &PipelineConfig::default(),
        );
        order_processor_server::app(AppState::new(pipeline), STOREFRONT_ORIGIN)
    }

    /// Put product `A/1` in the catalog with a single `professional` variant at 49.99.
    pub fn stock_halogen(&self) {
        self.catalog.insert(CatalogProduct {
            brand: "Osram".to_owned(),
            model: "64625 HLX".to_owned(),
            lamp_type: "Halogen".to_owned(),
            picture: "https://cdn.lampen.example.de/osram-64625.jpg".to_owned(),
            brand_id: "A".to_owned(),
            model_id: "1".to_owned(),
            lamp_type_id: "halogen".to_owned(),
            variants: [(
                "professional".to_owned(),
                VariantListing {
                    tier: "professional".to_owned(),
                    price: Decimal::new(4999, 2),
                    original_price: Decimal::new(5999, 2),
                    delivery_time: "1-2 Werktage".to_owned(),
                },
            )]
            .into(),
        });
    }

    /// Store a cart holding the given `(product id, variant, quantity)` entries.
    pub fn put_cart(&self, cart_id: &str, entries: &[(&str, &str, u64)]) -> CartId {
        let id = cart_id_of(cart_id);
        let lines = entries
            .iter()
            .map(|(product_id, variant, quantity)| CartLine {
                product_id: (*product_id).to_owned(),
                variants: [((*variant).to_owned(), *quantity)].into(),
            })
            .collect();
        self.carts.put(&id, &CompactCart { lines });
        id
    }
}

/// Parse a cart id used in a test.
///
/// # Panics
///
/// Panics if `raw` is not a valid cart id.
#[must_use]
pub fn cart_id_of(raw: &str) -> CartId {
    CartId::parse(raw).unwrap_or_else(|e| panic!("bad test cart id {raw}: {e}"))
}

/// A complete checkout form for `cart_id`, shipping to the billing address.
#[must_use]
pub fn order_form(cart_id: &str) -> OrderFormInput {
    OrderFormInput {
        billing_title: "Herr".to_owned(),
        billing_name: "Max Mustermann".to_owned(),
        billing_email: "max@example.de".to_owned(),
        billing_phone: "0221 123456".to_owned(),
        billing_street: "Hauptstraße 5".to_owned(),
        billing_zip: "50667".to_owned(),
        billing_city: "Köln".to_owned(),
        options_payment_method: "invoice".to_owned(),
        options_shipping_method: "dhl-standard".to_owned(),
        options_use_billing_for_shipping: "on".to_owned(),
        options_cart_id: cart_id.to_owned(),
        ..OrderFormInput::default()
    }
}

/// The urlencoded body the storefront posts for [`order_form`].
#[must_use]
pub fn encoded_order_form(cart_id: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs([
            ("BillingTitle", "Herr"),
            ("BillingName", "Max Mustermann"),
            ("BillingEmail", "max@example.de"),
            ("BillingPhone", "0221 123456"),
            ("BillingStreet", "Hauptstraße 5"),
            ("BillingZip", "50667"),
            ("BillingCity", "Köln"),
            ("OptionsPaymentMethod", "invoice"),
            ("OptionsShippingMethod", "dhl-standard"),
            ("OptionsUseBillingForShipping", "on"),
            ("OptionsCartID", cart_id),
        ])
        .finish()
}

/// A form POST to `/order/process` from a proxied client.
///
/// # Panics
///
/// Panics if the request cannot be built.
#[must_use]
pub fn process_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/order/process")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "198.51.100.23, 10.0.0.2")
        .body(Body::from(body))
        .unwrap_or_else(|e| panic!("failed to build request: {e}"))
}

/// Collect a response body as JSON.
///
/// # Panics
///
/// Panics if the body cannot be read or is not JSON.
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .unwrap_or_else(|e| panic!("failed to read body: {e}"))
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| panic!("body is not JSON: {e}"))
}
