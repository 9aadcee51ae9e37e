//! Order Processor server library.
//!
//! This crate provides the order finalization service as a library, allowing
//! it to be tested against in-memory collaborators and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod carts;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod memory;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderValue, Method, Request, header};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use state::AppState;

/// CORS policy admitting only the storefront origin.
///
/// An origin that is not a valid header value admits nothing.
#[must_use]
pub fn cors_layer(storefront_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::CONTENT_LENGTH]);

    match HeaderValue::from_str(storefront_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(_) => {
            tracing::warn!(origin = storefront_origin, "Invalid storefront origin, CORS disabled");
            layer
        }
    }
}

/// Span wrapping each request; `request_id` is filled in by the request ID middleware.
fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = tracing::field::Empty,
    )
}

/// Build the application router with its middleware stack.
pub fn app(state: AppState, storefront_origin: &str) -> Router {
    Router::new()
        .merge(routes::routes())
        .layer(cors_layer(storefront_origin))
        .layer(axum::middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}
