//! Cart cache backed by Redis.
//!
//! The storefront keeps the compact cart of each visitor under
//! `<prefix>__<cartID>`. The order processor reads it once per finalization
//! and overwrites it with the empty cart after the order is stored.

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use thiserror::Error;

use order_processor_core::{CartId, CompactCart};

/// Errors from cart cache operations.
#[derive(Debug, Error)]
pub enum CartCacheError {
    #[error("cart cache connection error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("cart cache redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cart could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cart cache unavailable: {0}")]
    Unavailable(String),
}

/// Raw cart storage.
///
/// `get` returns the stored bytes untouched; decoding happens in the resolver
/// so a malformed cart can be reported without modifying it.
#[async_trait]
pub trait CartCache: Send + Sync {
    /// Raw cart payload, `None` if no cart exists under this id.
    async fn get(&self, cart_id: &CartId) -> Result<Option<Vec<u8>>, CartCacheError>;

    /// Overwrite the cart stored under this id.
    async fn set(&self, cart_id: &CartId, cart: &CompactCart) -> Result<(), CartCacheError>;

    /// Check that the cache is reachable.
    async fn ping(&self) -> Result<(), CartCacheError>;
}

/// Build the cache key of a cart.
#[must_use]
pub fn cart_key(prefix: &str, cart_id: &CartId) -> String {
    format!("{prefix}__{cart_id}")
}

/// Redis implementation of [`CartCache`].
#[derive(Clone)]
pub struct RedisCartCache {
    pool: Pool,
    prefix: String,
}

impl RedisCartCache {
    #[must_use]
    pub fn new(pool: Pool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl CartCache for RedisCartCache {
    async fn get(&self, cart_id: &CartId) -> Result<Option<Vec<u8>>, CartCacheError> {
        let mut conn = self.pool.get().await?;
        let raw: Option<Vec<u8>> = conn.get(cart_key(&self.prefix, cart_id)).await?;
        Ok(raw)
    }

    async fn set(&self, cart_id: &CartId, cart: &CompactCart) -> Result<(), CartCacheError> {
        let payload = cart.to_json()?;
        let mut conn = self.pool.get().await?;
        let () = conn.set(cart_key(&self.prefix, cart_id), payload).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CartCacheError> {
        let mut conn = self.pool.get().await?;
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
