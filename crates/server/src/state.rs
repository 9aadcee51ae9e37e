//! Application state shared across handlers.

use std::sync::Arc;

use crate::services::pipeline::OrderPipeline;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. The pipeline owns every
/// collaborator handle (order store, cart cache, catalog, mailer).
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: OrderPipeline,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(pipeline: OrderPipeline) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pipeline }),
        }
    }

    /// Get a reference to the order finalization pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &OrderPipeline {
        &self.inner.pipeline
    }
}
