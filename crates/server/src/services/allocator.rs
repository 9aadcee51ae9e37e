//! Order number allocation and insert.
//!
//! The next number is read as `max + 1` and claimed by inserting the order.
//! Two finalizations that read the same maximum both try to insert the same
//! number; the store's unique constraint rejects one of them, which then
//! re-reads the maximum and tries again. Numbers of failed inserts are simply
//! never used, so gaps are possible and duplicates are not.

use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use order_processor_core::{Order, OrderDraft, OrderNumber};

use crate::db::{OrderStore, StoreError};

/// Randomized pause between conflicting attempts, in milliseconds.
const BACKOFF_MS: RangeInclusive<u64> = 10..=50;

/// Errors allocating a number and storing the order.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Reading the current maximum failed.
    #[error("could not read next order number: {0}")]
    Read(#[source] StoreError),

    /// Inserting the order failed for a reason other than a number conflict.
    #[error("could not store order {number}: {source}")]
    Insert {
        number: OrderNumber,
        #[source]
        source: StoreError,
    },

    /// A store call did not answer in time.
    #[error("order store timed out after {0:?}")]
    TimedOut(Duration),

    /// Every attempt lost the race for its number.
    #[error("no free order number after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

/// Assigns order numbers by inserting orders into the store.
#[derive(Clone)]
pub struct OrderAllocator {
    store: Arc<dyn OrderStore>,
    max_attempts: u32,
    timeout: Duration,
}

impl OrderAllocator {
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, max_attempts: u32, timeout: Duration) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
            timeout,
        }
    }

    /// Number the draft and persist it.
    ///
    /// Returns the stored order. Nothing is written unless this returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns `AllocationError` if the store fails, times out, or every
    /// attempt conflicts with a concurrent insert.
    pub async fn store(&self, draft: &OrderDraft) -> Result<Order, AllocationError> {
        for attempt in 1..=self.max_attempts {
            let number = tokio::time::timeout(self.timeout, self.store.next_order_number())
                .await
                .map_err(|_| AllocationError::TimedOut(self.timeout))?
                .map_err(AllocationError::Read)?;

            let order = draft.with_number(number);
            match tokio::time::timeout(self.timeout, self.store.insert(order)).await {
                Err(_) => return Err(AllocationError::TimedOut(self.timeout)),
                Ok(Ok(stored)) => {
                    tracing::info!(order_number = %number, attempt, "Order number allocated");
                    return Ok(stored);
                }
                Ok(Err(StoreError::Duplicate(taken))) => {
                    tracing::debug!(order_number = %taken, attempt, "Order number taken, retrying");
                    if attempt < self.max_attempts {
                        let pause = rand::rng().random_range(BACKOFF_MS);
                        tokio::time::sleep(Duration::from_millis(pause)).await;
                    }
                }
                Ok(Err(source)) => return Err(AllocationError::Insert { number, source }),
            }
        }

        tracing::error!(attempts = self.max_attempts, "Order number allocation exhausted");
        Err(AllocationError::Exhausted {
            attempts: self.max_attempts,
        })
    }
}
