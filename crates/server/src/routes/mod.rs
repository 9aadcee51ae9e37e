//! HTTP route handlers for the order processor.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness check
//! GET  /health/ready           - Readiness check (order store, cart cache, catalog)
//!
//! # Orders
//! POST /order/process          - Finalize the checkout form into an order
//! ```

pub mod health;
pub mod order;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new().route("/process", post(order::process))
}

/// Create all routes for the order processor.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/order", order_routes())
}
