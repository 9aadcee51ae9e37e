//! Order Processor - Checkout finalization service.
//!
//! This binary serves the order endpoint on port 8011.
//!
//! # Architecture
//!
//! - Axum web framework, one route doing the actual work (`POST /order/process`)
//! - Redis for the product catalog and the visitors' carts
//! - `PostgreSQL` for finalized orders
//! - SMTP for confirmation emails, rendered with Askama templates
//!
//! # Security
//!
//! This binary only has access to:
//! - Redis catalog database (read)
//! - Redis cart database (read, reset after order)
//! - Order `PostgreSQL` database (insert, read)
//! - SMTP relay

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use order_processor_server::carts::RedisCartCache;
use order_processor_server::catalog::{CachedCatalog, CatalogLookup, RedisCatalog, create_redis_pool};
use order_processor_server::config::ProcessorConfig;
use order_processor_server::db::{self, PgOrderStore};
use order_processor_server::services::email::SmtpMailer;
use order_processor_server::services::{Collaborators, OrderPipeline, ShopIdentity};
use order_processor_server::state::AppState;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ProcessorConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Initialize tracing with `EnvFilter`, plain or JSON output, and Sentry integration.
fn init_tracing() {
    // Defaults to info level for our crate if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "order_processor_server=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ProcessorConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    // Initialize database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p order-processor-cli -- migrate

    let catalog_url = config.redis.catalog_url().expect("Invalid catalog Redis URL");
    let cart_url = config.redis.cart_url().expect("Invalid cart Redis URL");
    let catalog_pool = create_redis_pool(&catalog_url).expect("Failed to create catalog Redis pool");
    let cart_pool = create_redis_pool(&cart_url).expect("Failed to create cart Redis pool");

    let mut catalog: Arc<dyn CatalogLookup> = Arc::new(RedisCatalog::new(
        catalog_pool,
        config.redis.catalog_namespace.clone(),
    ));
    if let Some(ttl) = config.redis.catalog_cache_ttl {
        catalog = Arc::new(CachedCatalog::new(catalog, ttl));
        tracing::info!(ttl_secs = ttl.as_secs(), "Catalog cache enabled");
    }

    let mailer = SmtpMailer::new(&config.mail).expect("Failed to create SMTP transport");

    let pipeline = OrderPipeline::new(
        Collaborators {
            catalog,
            carts: Arc::new(RedisCartCache::new(cart_pool, config.redis.cart_prefix.clone())),
            store: Arc::new(PgOrderStore::new(pool)),
            mailer: Arc::new(mailer),
        },
        ShopIdentity::from_config(&config),
        &config.pipeline,
    );
    let state = AppState::new(pipeline);

    // Build router
    let app = order_processor_server::app(state, &config.shop.url)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    // Start server
    let addr = config.socket_addr();
    tracing::info!("order processor listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
