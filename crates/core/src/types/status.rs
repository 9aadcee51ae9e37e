//! Order status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a persisted order.
///
/// The finalization pipeline only ever writes [`OrderStatus::Unprocessed`];
/// later transitions belong to fulfillment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Unprocessed,
    InProgress,
    Shipped,
    Cancelled,
}

impl OrderStatus {
    /// Stable string form used in storage and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::InProgress => "in_progress",
            Self::Shipped => "shipped",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
