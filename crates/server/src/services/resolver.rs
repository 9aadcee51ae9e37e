//! Cart resolution: cached compact cart → catalog-enriched resolved cart.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;

use order_processor_core::{
    CartId, CartLine, CompactCart, ProductRef, ResolvedCart, ResolvedProduct,
};

use crate::carts::CartCache;
use crate::catalog::CatalogLookup;

/// Errors loading the cart of a finalization.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No cart is stored under the id.
    #[error("cart {0} not found")]
    NotFound(CartId),

    /// The stored cart is not a valid compact cart.
    #[error("cart {cart_id} could not be decoded: {source}")]
    Decode {
        cart_id: CartId,
        source: serde_json::Error,
    },

    /// The cart cache failed or did not answer in time.
    #[error("cart cache unavailable: {0}")]
    Unavailable(String),
}

/// Why a cart line did not make it into the resolved cart.
#[derive(Debug, Error)]
pub enum CatalogMiss {
    #[error("product id is not of the form brand/model")]
    MalformedProductId,

    #[error("product is not in the catalog")]
    NotFound,

    #[error("catalog lookup failed: {0}")]
    Lookup(#[from] crate::catalog::CatalogError),

    #[error("catalog lookup timed out after {0:?}")]
    TimedOut(Duration),
}

/// Loads carts and resolves their lines against the catalog.
#[derive(Clone)]
pub struct CartResolver {
    catalog: Arc<dyn CatalogLookup>,
    carts: Arc<dyn CartCache>,
    catalog_timeout: Duration,
    cart_timeout: Duration,
}

impl CartResolver {
    #[must_use]
    pub fn new(
        catalog: Arc<dyn CatalogLookup>,
        carts: Arc<dyn CartCache>,
        catalog_timeout: Duration,
        cart_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            carts,
            catalog_timeout,
            cart_timeout,
        }
    }

    /// Read and decode the cart stored under `cart_id`.
    ///
    /// The stored cart is never modified here.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::NotFound` for an unknown id, `ResolveError::Decode`
    /// for a malformed payload and `ResolveError::Unavailable` if the cache
    /// fails or times out.
    pub async fn load(&self, cart_id: &CartId) -> Result<CompactCart, ResolveError> {
        let raw = tokio::time::timeout(self.cart_timeout, self.carts.get(cart_id))
            .await
            .map_err(|_| {
                ResolveError::Unavailable(format!("timed out after {:?}", self.cart_timeout))
            })?
            .map_err(|e| ResolveError::Unavailable(e.to_string()))?
            .ok_or_else(|| ResolveError::NotFound(cart_id.clone()))?;

        CompactCart::from_json(&raw).map_err(|source| ResolveError::Decode {
            cart_id: cart_id.clone(),
            source,
        })
    }

    /// Resolve every cart line against the catalog.
    ///
    /// Lookups run concurrently. A line whose product cannot be resolved is
    /// dropped and logged; it never fails the cart. Lines without any non-zero
    /// quantity are skipped without a lookup. If the cart lists a product id
    /// twice, the later line wins.
    pub async fn resolve(&self, cart: &CompactCart) -> ResolvedCart {
        let selected = cart
            .lines
            .iter()
            .filter(|line| line.variants.values().any(|&quantity| quantity > 0));

        let lookups = selected.map(|line| async move { (line, self.resolve_line(line).await) });

        let mut resolved = ResolvedCart::default();
        for (line, outcome) in join_all(lookups).await {
            match outcome {
                Ok(product) if product.variants.is_empty() => {
                    tracing::debug!(product_id = %line.product_id, "No catalog variant selected");
                }
                Ok(product) => {
                    for tier in product.unknown_tiers() {
                        tracing::warn!(product_id = %line.product_id, tier, "Unknown product tier");
                    }
                    resolved.products.insert(line.product_id.clone(), product);
                }
                Err(miss) => {
                    tracing::warn!(product_id = %line.product_id, reason = %miss, "Cart line dropped");
                }
            }
        }
        resolved
    }

    async fn resolve_line(&self, line: &CartLine) -> Result<ResolvedProduct, CatalogMiss> {
        let product = ProductRef::parse(&line.product_id).ok_or(CatalogMiss::MalformedProductId)?;

        let snapshot = tokio::time::timeout(self.catalog_timeout, self.catalog.get(&product))
            .await
            .map_err(|_| CatalogMiss::TimedOut(self.catalog_timeout))??
            .ok_or(CatalogMiss::NotFound)?;

        Ok(ResolvedProduct::select(&snapshot, &line.variants))
    }
}
