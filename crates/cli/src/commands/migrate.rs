//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! op-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `ORDERS_DATABASE_URL` - `PostgreSQL` connection string for the order store
//!   (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Order store migrations: `crates/server/migrations/`

use secrecy::ExposeSecret;
use sqlx::PgPool;

use super::{CommandError, database_url};

/// Run order store migrations.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to order database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running order store migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Order store migrations complete!");
    Ok(())
}
