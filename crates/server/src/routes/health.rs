//! Health check endpoints.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Pings the order store, the cart cache and the catalog. Returns 503 Service
/// Unavailable listing the collaborators that did not answer.
pub async fn readiness(State(state): State<AppState>) -> Response {
    let readiness = state.pipeline().readiness().await;
    if readiness.is_ready() {
        StatusCode::OK.into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "failing": readiness.failing })),
        )
            .into_response()
    }
}
