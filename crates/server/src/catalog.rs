//! Catalog lookup backed by Redis.
//!
//! Catalog records are JSON documents stored under
//! `<namespace>__<brandID>__<modelID>`. The order processor only reads them.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config, Pool, Runtime};
use moka::future::Cache;
use redis::AsyncCommands;
use thiserror::Error;

use order_processor_core::{CatalogProduct, ProductRef};

/// Maximum number of catalog records held in the in-process cache.
const CACHE_CAPACITY: u64 = 10_000;

/// Errors from catalog lookups.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog connection error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("catalog redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("catalog record for {product} is invalid: {source}")]
    Decode {
        product: String,
        source: serde_json::Error,
    },

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to catalog products.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Fetch the snapshot of one product model, `None` if the catalog has no entry.
    async fn get(&self, product: &ProductRef) -> Result<Option<CatalogProduct>, CatalogError>;

    /// Check that the catalog is reachable.
    async fn ping(&self) -> Result<(), CatalogError>;
}

/// Build the catalog key of a product.
#[must_use]
pub fn catalog_key(namespace: &str, product: &ProductRef) -> String {
    format!("{namespace}__{}__{}", product.brand_id, product.model_id)
}

/// Decode a stored catalog record.
///
/// # Errors
///
/// Returns `CatalogError::Decode` if the record is not valid JSON or a
/// listing lacks its prices.
pub fn decode_product(product: &ProductRef, raw: &[u8]) -> Result<CatalogProduct, CatalogError> {
    serde_json::from_slice(raw).map_err(|source| CatalogError::Decode {
        product: product.to_string(),
        source,
    })
}

/// Create a Redis connection pool for the given URL.
///
/// # Errors
///
/// Returns `deadpool_redis::CreatePoolError` if the URL is invalid.
pub fn create_redis_pool(url: &str) -> Result<Pool, deadpool_redis::CreatePoolError> {
    Config::from_url(url).create_pool(Some(Runtime::Tokio1))
}

/// Redis implementation of [`CatalogLookup`].
#[derive(Clone)]
pub struct RedisCatalog {
    pool: Pool,
    namespace: String,
}

impl RedisCatalog {
    #[must_use]
    pub fn new(pool: Pool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }
}

#[async_trait]
impl CatalogLookup for RedisCatalog {
    async fn get(&self, product: &ProductRef) -> Result<Option<CatalogProduct>, CatalogError> {
        let key = catalog_key(&self.namespace, product);
        let mut conn = self.pool.get().await?;
        let raw: Option<Vec<u8>> = conn.get(&key).await?;

        raw.map(|bytes| decode_product(product, &bytes)).transpose()
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        let mut conn = self.pool.get().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

/// In-process cache in front of another [`CatalogLookup`].
///
/// Only found products are cached; misses and errors always reach the inner
/// lookup so a newly listed product shows up without waiting for the TTL.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn CatalogLookup>,
    cache: Cache<ProductRef, Arc<CatalogProduct>>,
}

impl CachedCatalog {
    #[must_use]
    pub fn new(inner: Arc<dyn CatalogLookup>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(ttl)
            .build();
        Self { inner, cache }
    }
}

#[async_trait]
impl CatalogLookup for CachedCatalog {
    async fn get(&self, product: &ProductRef) -> Result<Option<CatalogProduct>, CatalogError> {
        if let Some(hit) = self.cache.get(product).await {
            tracing::trace!(product_id = %product, "Catalog cache hit");
            return Ok(Some(hit.as_ref().clone()));
        }

        let found = self.inner.get(product).await?;
        if let Some(snapshot) = &found {
            self.cache
                .insert(product.clone(), Arc::new(snapshot.clone()))
                .await;
        }
        Ok(found)
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        self.inner.ping().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryCatalog;

    fn osram() -> ProductRef {
        ProductRef::parse("osram/64625").unwrap()
    }

    #[test]
    fn test_catalog_key() {
        assert_eq!(
            catalog_key("PRODUCT_MODEL", &osram()),
            "PRODUCT_MODEL__osram__64625"
        );
    }

    #[test]
    fn test_decode_product_requires_prices() {
        let err = decode_product(&osram(), br#"{"Variants":{"professional":{"Name":"Pro"}}}"#)
            .unwrap_err();
        assert!(matches!(err, CatalogError::Decode { ref product, .. } if product == "osram/64625"));

        let product = decode_product(
            &osram(),
            br#"{"BrandID":"osram","Variants":{"professional":{"Price":12.5,"OriginalPrice":15}}}"#,
        )
        .unwrap();
        assert_eq!(product.variants["professional"].price, rust_decimal::Decimal::new(125, 1));
    }

    #[tokio::test]
    async fn test_cached_catalog_serves_repeat_hits_from_cache() {
        let inner = Arc::new(MemoryCatalog::new());
        inner.insert(CatalogProduct {
            brand_id: "osram".to_owned(),
            model_id: "64625".to_owned(),
            ..CatalogProduct::default()
        });
        let cached = CachedCatalog::new(inner.clone(), Duration::from_secs(30));

        assert!(cached.get(&osram()).await.unwrap().is_some());
        assert!(cached.get(&osram()).await.unwrap().is_some());
        assert_eq!(inner.lookups(), 1);
    }

    #[tokio::test]
    async fn test_cached_catalog_does_not_cache_misses() {
        let inner = Arc::new(MemoryCatalog::new());
        let cached = CachedCatalog::new(inner.clone(), Duration::from_secs(30));

        assert!(cached.get(&osram()).await.unwrap().is_none());
        assert!(cached.get(&osram()).await.unwrap().is_none());
        assert_eq!(inner.lookups(), 2);
    }
}
