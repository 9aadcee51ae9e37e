//! Database operations for the order store `PostgreSQL`.
//!
//! # Database: `orders`
//!
//! ## Tables
//!
//! - `orders.order_document` - One row per finalized order. Scalar columns for
//!   lookups plus the complete order document as `JSONB`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p order-processor-cli -- migrate
//! ```

pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use order_processor_core::OrderNumber;

pub use orders::{OrderStore, PgOrderStore};

/// Errors that can occur in order store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// An order with this number already exists.
    #[error("order number {0} already exists")]
    Duplicate(OrderNumber),

    /// A stored document could not be decoded.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The store could not be reached.
    #[error("order store unavailable: {0}")]
    Unavailable(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
