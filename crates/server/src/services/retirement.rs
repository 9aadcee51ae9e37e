//! Cart retirement after a stored order.

use std::sync::Arc;
use std::time::Duration;

use order_processor_core::{CartId, CompactCart, OrderNumber};

use crate::carts::CartCache;

/// Empties carts whose order has been persisted.
#[derive(Clone)]
pub struct CartRetirement {
    carts: Arc<dyn CartCache>,
    timeout: Duration,
}

impl CartRetirement {
    #[must_use]
    pub fn new(carts: Arc<dyn CartCache>, timeout: Duration) -> Self {
        Self { carts, timeout }
    }

    /// Overwrite the cart with the empty cart.
    ///
    /// Must only be called after the order is stored. Failure is logged and
    /// reported as `false`; the order stands either way.
    pub async fn retire(&self, cart_id: &CartId, order_number: OrderNumber) -> bool {
        let empty = CompactCart::empty();
        match tokio::time::timeout(self.timeout, self.carts.set(cart_id, &empty)).await {
            Ok(Ok(())) => {
                tracing::debug!(cart_id = %cart_id, order_number = %order_number, "Cart retired");
                true
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    cart_id = %cart_id,
                    order_number = %order_number,
                    error = %e,
                    "Failed to retire cart"
                );
                false
            }
            Err(_) => {
                tracing::warn!(
                    cart_id = %cart_id,
                    order_number = %order_number,
                    timeout = ?self.timeout,
                    "Cart retirement timed out"
                );
                false
            }
        }
    }
}
