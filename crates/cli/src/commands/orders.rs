//! Order inspection commands.
//!
//! # Usage
//!
//! ```bash
//! # Print the stored document of order 42
//! op-cli orders show 42
//!
//! # List the ten most recent orders
//! op-cli orders recent --limit 10
//!
//! # Print the number the next order would get
//! op-cli orders next-number
//! ```

use order_processor_core::{Order, OrderNumber};
use order_processor_server::db::{self, OrderStore, PgOrderStore};

use super::{CommandError, database_url};

async fn connect() -> Result<PgOrderStore, CommandError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to order database...");
    let pool = db::create_pool(&database_url).await?;
    Ok(PgOrderStore::new(pool))
}

/// One-line summary of an order.
fn summary(order: &Order) -> String {
    format!(
        "#{:<6} {}  {:<12} {:>10} EUR  {} <{}>",
        order.number().as_i64(),
        order.header.date.format("%Y-%m-%d %H:%M"),
        order.header.status.as_str(),
        order.totals().grand_total_display(),
        order.customer.billing_name,
        order.customer.billing_email,
    )
}

/// Print the full document of one order.
pub async fn show(number: i64) -> Result<(), CommandError> {
    let store = connect().await?;
    let order = store
        .find_by_number(OrderNumber::new(number))
        .await?
        .ok_or(CommandError::OrderNotFound(number))?;

    let document = serde_json::to_string_pretty(&order)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{document}");
    }
    Ok(())
}

/// List the most recent orders, newest first.
pub async fn recent(limit: u32) -> Result<(), CommandError> {
    let store = connect().await?;
    let orders = store.recent(limit).await?;

    if orders.is_empty() {
        tracing::info!("No orders stored yet");
        return Ok(());
    }

    #[allow(clippy::print_stdout)]
    for order in &orders {
        println!("{}", summary(order));
    }
    Ok(())
}

/// Print the number the next finalized order would be given.
pub async fn next_number() -> Result<(), CommandError> {
    let store = connect().await?;
    let next = store.next_order_number().await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{next}");
    }
    Ok(())
}
