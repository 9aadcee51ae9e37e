//! Order finalization: validated form + cached cart → stored, numbered order.
//!
//! Stages run in a fixed order:
//!
//! 1. Validate the form.
//! 2. Load and decode the cart.
//! 3. Resolve cart lines against the catalog.
//! 4. Price the resolved cart.
//! 5. Allocate a number and insert the order.
//! 6. Retire the cart.
//! 7. Hand the order to the notification dispatcher.
//!
//! Any failure up to step 5 aborts the finalization with nothing written and
//! the cart untouched. Steps 6 and 7 cannot fail the finalization.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;

use order_processor_core::{Order, OrderDraft, OrderFormInput, quote};

use super::allocator::OrderAllocator;
use super::email::{Address, Mailer};
use super::notify::{NotificationDispatcher, NotificationReport};
use super::resolver::CartResolver;
use super::retirement::CartRetirement;
use crate::carts::CartCache;
use crate::catalog::CatalogLookup;
use crate::config::{PipelineConfig, ProcessorConfig};
use crate::db::OrderStore;
use crate::error::{FinalizeError, add_breadcrumb};

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogLookup>,
    pub carts: Arc<dyn CartCache>,
    pub store: Arc<dyn OrderStore>,
    pub mailer: Arc<dyn Mailer>,
}

/// Who the orders belong to and who hears about them.
#[derive(Debug, Clone)]
pub struct ShopIdentity {
    /// Shop identifier written into each order.
    pub domain: String,
    /// Sender of every notification.
    pub sender: Address,
    /// Internal recipient of new-order notifications.
    pub notify: Address,
}

impl ShopIdentity {
    #[must_use]
    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self {
            domain: config.shop.domain.clone(),
            sender: Address::new(config.shop.name.clone(), config.shop.email.clone()),
            notify: Address::new(config.mail.notify_name.clone(), config.mail.notify_email.clone()),
        }
    }
}

/// A successfully stored order.
#[derive(Debug)]
pub struct Finalized {
    pub order: Order,
    /// Whether the cart was emptied. The order stands either way.
    pub cart_retired: bool,
    /// Confirmation emails, sent in the background.
    pub notification: JoinHandle<NotificationReport>,
}

/// Outcome of a readiness probe.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Collaborators that did not answer.
    pub failing: Vec<&'static str>,
}

impl Readiness {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.failing.is_empty()
    }
}

/// The order finalization pipeline.
#[derive(Clone)]
pub struct OrderPipeline {
    collaborators: Collaborators,
    resolver: CartResolver,
    allocator: OrderAllocator,
    retirement: CartRetirement,
    notifier: NotificationDispatcher,
    tax_rate: Decimal,
    shop_domain: String,
}

impl OrderPipeline {
    #[must_use]
    pub fn new(collaborators: Collaborators, shop: ShopIdentity, config: &PipelineConfig) -> Self {
        let resolver = CartResolver::new(
            Arc::clone(&collaborators.catalog),
            Arc::clone(&collaborators.carts),
            config.catalog_timeout,
            config.cart_timeout,
        );
        let allocator = OrderAllocator::new(
            Arc::clone(&collaborators.store),
            config.max_allocation_attempts,
            config.store_timeout,
        );
        let retirement = CartRetirement::new(Arc::clone(&collaborators.carts), config.cart_timeout);
        let notifier = NotificationDispatcher::new(
            Arc::clone(&collaborators.mailer),
            shop.sender,
            shop.notify,
            config.mail_timeout,
        );

        Self {
            collaborators,
            resolver,
            allocator,
            retirement,
            notifier,
            tax_rate: config.tax_rate,
            shop_domain: shop.domain,
        }
    }

    /// Finalize the order described by `input`, placed from `client_ip`.
    ///
    /// # Errors
    ///
    /// Returns `FinalizeError` if the form is invalid, the cart is missing,
    /// malformed, unavailable, empty or unpriceable, or the order could not be stored. In
    /// every error case nothing has been persisted and the cart is unchanged.
    #[tracing::instrument(
        skip_all,
        fields(cart_id = tracing::field::Empty, order_number = tracing::field::Empty)
    )]
    pub async fn finalize(
        &self,
        input: OrderFormInput,
        client_ip: IpAddr,
    ) -> Result<Finalized, FinalizeError> {
        let customer = input.validate()?;
        let cart_id = customer.options_cart_id.clone();
        tracing::Span::current().record("cart_id", tracing::field::display(&cart_id));

        let cart = self.resolver.load(&cart_id).await?;
        let resolved = self.resolver.resolve(&cart).await;
        let product_count = resolved.products.len().to_string();
        add_breadcrumb(
            "order",
            "Cart resolved",
            Some(&[("cart_id", cart_id.as_str()), ("products", product_count.as_str())]),
        );

        let priced = quote(&resolved, self.tax_rate).map_err(|source| FinalizeError::Pricing {
            cart_id: cart_id.clone(),
            source,
        })?;
        if priced.is_empty() {
            tracing::info!("Cart has nothing to order");
            return Err(FinalizeError::EmptyCart(cart_id));
        }

        let draft = OrderDraft {
            customer,
            lines: priced.lines,
            totals: priced.totals,
            created_at: Utc::now(),
            shop: self.shop_domain.clone(),
            client_ip: client_ip.to_string(),
        };

        let order = self.allocator.store(&draft).await?;
        tracing::Span::current().record("order_number", order.number().as_i64());
        tracing::info!(
            lines = order.lines.len(),
            grand_total = %order.totals().grand_total,
            "Order stored"
        );

        let cart_retired = self.retirement.retire(&cart_id, order.number()).await;
        let notification = self.notifier.spawn(order.clone());

        Ok(Finalized {
            order,
            cart_retired,
            notification,
        })
    }

    /// Ping every collaborator the finalization depends on.
    pub async fn readiness(&self) -> Readiness {
        let (store, carts, catalog) = tokio::join!(
            self.collaborators.store.ping(),
            self.collaborators.carts.ping(),
            self.collaborators.catalog.ping(),
        );

        let mut readiness = Readiness::default();
        if let Err(e) = store {
            tracing::warn!(error = %e, "Order store not ready");
            readiness.failing.push("order_store");
        }
        if let Err(e) = carts {
            tracing::warn!(error = %e, "Cart cache not ready");
            readiness.failing.push("cart_cache");
        }
        if let Err(e) = catalog {
            tracing::warn!(error = %e, "Catalog not ready");
            readiness.failing.push("catalog");
        }
        readiness
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use order_processor_core::catalog::VariantListing;
    use order_processor_core::{CartId, CartLine, CatalogProduct, CompactCart, OrderNumber};

    use super::*;
    use crate::error::FailureReason;
    use crate::memory::{MemoryCartCache, MemoryCatalog, MemoryMailer, MemoryOrderStore};

    struct Fixture {
        catalog: Arc<MemoryCatalog>,
        carts: Arc<MemoryCartCache>,
        store: Arc<MemoryOrderStore>,
        mailer: Arc<MemoryMailer>,
        pipeline: OrderPipeline,
    }

    fn fixture() -> Fixture {
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
                sender: Address::new("Lampenwelt", "shop@example.de"),
                notify: Address::new("Bestellungen", "orders@example.de"),
            },
            &PipelineConfig {
                mail_timeout: Duration::from_millis(200),
                ..PipelineConfig::default()
            },
        );
        Fixture {
            catalog,
            carts,
            store,
            mailer,
            pipeline,
        }
    }

    fn input(cart_id: &str) -> OrderFormInput {
        OrderFormInput {
            billing_title: "Frau".to_owned(),
            billing_name: "Erika Mustermann".to_owned(),
            billing_email: "erika@example.de".to_owned(),
            billing_street: "Heidestraße 17".to_owned(),
            billing_zip: "51147".to_owned(),
            billing_city: "Köln".to_owned(),
            options_payment_method: "invoice".to_owned(),
            options_shipping_method: "dhl-standard".to_owned(),
            options_use_billing_for_shipping: "true".to_owned(),
            options_cart_id: cart_id.to_owned(),
            ..OrderFormInput::default()
        }
    }

    fn stock(fixture: &Fixture) {
        fixture.catalog.insert(CatalogProduct {
            brand: "Osram".to_owned(),
            model: "64625 HLX".to_owned(),
            brand_id: "A".to_owned(),
            model_id: "1".to_owned(),
            variants: [(
                "professional".to_owned(),
                VariantListing {
                    tier: "professional".to_owned(),
                    price: Decimal::new(4999, 2),
                    original_price: Decimal::new(5999, 2),
                    delivery_time: "1-2 Tage".to_owned(),
                },
            )]
            .into(),
            ..CatalogProduct::default()
        });
    }

    fn put_cart(fixture: &Fixture, cart_id: &str, quantity: u64) -> CartId {
        let id = CartId::parse(cart_id).unwrap();
        fixture.carts.put(
            &id,
            &CompactCart {
                lines: vec![CartLine {
                    product_id: "A/1".to_owned(),
                    variants: [("professional".to_owned(), quantity)].into(),
                }],
            },
        );
        id
    }

    fn ip() -> IpAddr {
        "203.0.113.9".parse().unwrap()
    }

    #[tokio::test]
    async fn test_finalize_stores_order_and_retires_cart() {
        let fx = fixture();
        stock(&fx);
        let id = put_cart(&fx, "cart-1", 2);

        let done = fx.pipeline.finalize(input("cart-1"), ip()).await.unwrap();

        assert_eq!(done.order.number(), OrderNumber::FIRST);
        assert!(done.cart_retired);
        assert_eq!(fx.store.orders(), vec![done.order.clone()]);
        assert!(fx.carts.cart(&id).unwrap().is_empty());
        assert_eq!(done.order.analytics.ip, "203.0.113.9");
        assert_eq!(done.order.header.shop, "lampen.example.de");

        let report = done.notification.await.unwrap();
        assert!(report.all_sent());
        assert_eq!(fx.mailer.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_form_touches_nothing() {
        let fx = fixture();
        let bad = OrderFormInput {
            billing_name: String::new(),
            ..input("cart-1")
        };

        let err = fx.pipeline.finalize(bad, ip()).await.unwrap_err();

        assert!(matches!(err, FinalizeError::InvalidForm(_)));
        assert_eq!(fx.carts.reads(), 0);
        assert_eq!(fx.store.insert_attempts(), 0);
    }

    #[tokio::test]
    async fn test_unpriceable_cart_stores_nothing() {
        let fx = fixture();
        let id = CartId::parse("cart-1").unwrap();
        fx.carts.put(
            &id,
            &CompactCart {
                lines: vec![CartLine {
                    product_id: "A/1".to_owned(),
                    variants: [("professional".to_owned(), u64::MAX)].into(),
                }],
            },
        );
        fx.catalog.insert(CatalogProduct {
            brand_id: "A".to_owned(),
            model_id: "1".to_owned(),
            variants: [(
                "professional".to_owned(),
                VariantListing {
                    price: Decimal::from_i128_with_scale(50_000_000_000_000_000_000_000_000_000, 0),
                    ..VariantListing::default()
                },
            )]
            .into(),
            ..CatalogProduct::default()
        });

        let err = fx.pipeline.finalize(input("cart-1"), ip()).await.unwrap_err();

        assert!(matches!(err, FinalizeError::Pricing { .. }));
        assert_eq!(err.reason(), FailureReason::CantConvertCart);
        assert_eq!(fx.store.insert_attempts(), 0);
        assert!(!fx.carts.cart(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_retired_cart_is_rejected_as_empty() {
        let fx = fixture();
        stock(&fx);
        put_cart(&fx, "cart-1", 1);

        fx.pipeline.finalize(input("cart-1"), ip()).await.unwrap();
        let err = fx.pipeline.finalize(input("cart-1"), ip()).await.unwrap_err();

        assert!(matches!(err, FinalizeError::EmptyCart(_)));
        assert_eq!(fx.store.len(), 1);
    }

    #[tokio::test]
    async fn test_retirement_failure_keeps_order() {
        let fx = fixture();
        stock(&fx);
        let id = put_cart(&fx, "cart-1", 1);
        fx.carts.set_failing_writes(true);

        let done = fx.pipeline.finalize(input("cart-1"), ip()).await.unwrap();

        assert!(!done.cart_retired);
        assert_eq!(fx.store.len(), 1);
        assert!(!fx.carts.cart(&id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_readiness_reports_failing_collaborators() {
        let fx = fixture();
        assert!(fx.pipeline.readiness().await.is_ready());

        fx.store.set_unreachable(true);
        fx.catalog.set_failing(true);
        let readiness = fx.pipeline.readiness().await;

        assert_eq!(readiness.failing, vec!["order_store", "catalog"]);
    }
}
