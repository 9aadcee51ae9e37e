//! Order Processor CLI - Database migrations and order inspection.
//!
//! # Usage
//!
//! ```bash
//! # Run order store migrations
//! op-cli migrate
//!
//! # Inspect stored orders
//! op-cli orders show 42
//! op-cli orders recent --limit 20
//! op-cli orders next-number
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `orders` - Read-only views of the order store

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "op-cli")]
#[command(author, version, about = "Order processor CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run order store migrations
    Migrate,
    /// Inspect stored orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Print the stored document of an order
    Show {
        /// Order number
        number: i64,
    },
    /// List the most recent orders
    Recent {
        /// Number of orders to list
        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },
    /// Print the number the next order would get
    NextNumber,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Orders { action } => match action {
            OrdersAction::Show { number } => commands::orders::show(number).await?,
            OrdersAction::Recent { limit } => commands::orders::recent(limit).await?,
            OrdersAction::NextNumber => commands::orders::next_number().await?,
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_recent_limit_default() {
        let cli = Cli::try_parse_from(["op-cli", "orders", "recent"]).unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            cli.command,
            Commands::Orders { action: OrdersAction::Recent { limit: 20 } }
        ));
    }
}
