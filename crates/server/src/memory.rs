//! In-memory collaborators.
//!
//! Used by the unit and integration tests and for running the pipeline
//! without Redis, `PostgreSQL` or an SMTP relay. Each type counts the calls it
//! receives and can be told to fail, so tests can check both outcomes and
//! side effects.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Barrier;

use order_processor_core::{CartId, CatalogProduct, CompactCart, Order, OrderNumber, ProductRef};

use crate::carts::{CartCache, CartCacheError};
use crate::catalog::{CatalogError, CatalogLookup, decode_product};
use crate::db::{OrderStore, StoreError};
use crate::services::email::{MailError, MailMessage, Mailer};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog held in a map keyed by `brandID/modelID`.
#[derive(Default)]
pub struct MemoryCatalog {
    products: Mutex<HashMap<ProductRef, CatalogProduct>>,
    records: Mutex<HashMap<ProductRef, Vec<u8>>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a product, keyed by its brand and model ids.
    pub fn insert(&self, product: CatalogProduct) {
        let key = ProductRef {
            brand_id: product.brand_id.clone(),
            model_id: product.model_id.clone(),
        };
        lock(&self.products).insert(key, product);
    }

    /// Store a raw record under `product`, decoded on every lookup.
    pub fn insert_raw(&self, product: ProductRef, raw: impl Into<Vec<u8>>) {
        lock(&self.records).insert(product, raw.into());
    }

    /// Make every lookup fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay lookups of one `brandID/modelID`.
    pub fn set_delay_for(&self, product_id: &str, delay: Duration) {
        lock(&self.delays).insert(product_id.to_owned(), delay);
    }

    /// Number of lookups received.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogLookup for MemoryCatalog {
    async fn get(&self, product: &ProductRef) -> Result<Option<CatalogProduct>, CatalogError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        let delay = lock(&self.delays).get(&product.to_string()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("memory catalog set to fail".to_owned()));
        }
        if let Some(found) = lock(&self.products).get(product).cloned() {
            return Ok(Some(found));
        }
        let raw = lock(&self.records).get(product).cloned();
        raw.map(|bytes| decode_product(product, &bytes)).transpose()
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CatalogError::Unavailable("memory catalog set to fail".to_owned()));
        }
        Ok(())
    }
}

// =============================================================================
// Cart cache
// =============================================================================

/// Cart cache holding raw payloads.
#[derive(Default)]
pub struct MemoryCartCache {
    carts: Mutex<HashMap<CartId, Vec<u8>>>,
    failing: AtomicBool,
    failing_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryCartCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a cart.
    ///
    /// # Panics
    ///
    /// Panics if the cart cannot be encoded, which cannot happen for a
    /// [`CompactCart`].
    pub fn put(&self, cart_id: &CartId, cart: &CompactCart) {
        let payload = cart.to_json().expect("compact cart encodes");
        self.put_raw(cart_id, payload.into_bytes());
    }

    /// Store a raw payload, valid or not.
    pub fn put_raw(&self, cart_id: &CartId, payload: Vec<u8>) {
        lock(&self.carts).insert(cart_id.clone(), payload);
    }

    /// Raw payload stored under `cart_id`.
    pub fn raw(&self, cart_id: &CartId) -> Option<Vec<u8>> {
        lock(&self.carts).get(cart_id).cloned()
    }

    /// Decoded cart stored under `cart_id`, `None` if absent or malformed.
    pub fn cart(&self, cart_id: &CartId) -> Option<CompactCart> {
        self.raw(cart_id)
            .and_then(|raw| CompactCart::from_json(&raw).ok())
    }

    /// Make reads and writes fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make only writes fail.
    pub fn set_failing_writes(&self, failing: bool) {
        self.failing_writes.store(failing, Ordering::SeqCst);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CartCache for MemoryCartCache {
    async fn get(&self, cart_id: &CartId) -> Result<Option<Vec<u8>>, CartCacheError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CartCacheError::Unavailable("memory cart cache set to fail".to_owned()));
        }
        Ok(self.raw(cart_id))
    }

    async fn set(&self, cart_id: &CartId, cart: &CompactCart) -> Result<(), CartCacheError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) || self.failing_writes.load(Ordering::SeqCst) {
            return Err(CartCacheError::Unavailable("memory cart cache set to fail".to_owned()));
        }
        let payload = cart.to_json()?;
        self.put_raw(cart_id, payload.into_bytes());
        Ok(())
    }

    async fn ping(&self) -> Result<(), CartCacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CartCacheError::Unavailable("memory cart cache set to fail".to_owned()));
        }
        Ok(())
    }
}

// =============================================================================
// Order store
// =============================================================================

/// Order store with the same unique-number contract as the database table.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<BTreeMap<OrderNumber, Order>>,
    read_gate: Mutex<Option<(Arc<Barrier>, usize)>>,
    pending_conflicts: AtomicU32,
    failing_inserts: AtomicBool,
    unreachable: AtomicBool,
    insert_attempts: AtomicUsize,
}

impl MemoryOrderStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `reads` maximum reads wait on `barrier` after reading.
    ///
    /// Lets a test line up concurrent finalizations so they all observe the
    /// same maximum before any of them inserts.
    pub fn hold_reads(&self, barrier: Arc<Barrier>, reads: usize) {
        *lock(&self.read_gate) = Some((barrier, reads));
    }

    /// Make the next `count` inserts lose to a concurrent writer.
    ///
    /// The losing number is occupied by a copy of the rejected order, as if
    /// another finalization had stored it first.
    pub fn inject_conflicts(&self, count: u32) {
        self.pending_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make inserts fail with a database error.
    pub fn set_failing_inserts(&self, failing: bool) {
        self.failing_inserts.store(failing, Ordering::SeqCst);
    }

    /// Make every call fail as if the store were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of insert calls received, successful or not.
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Number of stored orders.
    pub fn len(&self) -> usize {
        lock(&self.orders).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the stored orders in number order.
    pub fn orders(&self) -> Vec<Order> {
        lock(&self.orders).values().cloned().collect()
    }

    fn check_reachable(&self) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to unreachable".to_owned()));
        }
        Ok(())
    }

    fn take_read_gate(&self) -> Option<Arc<Barrier>> {
        let mut gate = lock(&self.read_gate);
        let (barrier, remaining) = gate.as_mut()?;
        let barrier = Arc::clone(barrier);
        *remaining -= 1;
        if *remaining == 0 {
            *gate = None;
        }
        Some(barrier)
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn max_order_number(&self) -> Result<Option<OrderNumber>, StoreError> {
        self.check_reachable()?;
        let max = lock(&self.orders).keys().next_back().copied();
        if let Some(barrier) = self.take_read_gate() {
            barrier.wait().await;
        }
        Ok(max)
    }

    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        if self.failing_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail inserts".to_owned()));
        }

        let number = order.number();
        let mut orders = lock(&self.orders);
        if self.take_conflict() {
            orders.entry(number).or_insert_with(|| order.clone());
        }
        if orders.contains_key(&number) {
            return Err(StoreError::Duplicate(number));
        }
        orders.insert(number, order.clone());
        Ok(order)
    }

    async fn find_by_number(&self, number: OrderNumber) -> Result<Option<Order>, StoreError> {
        self.check_reachable()?;
        Ok(lock(&self.orders).get(&number).cloned())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Order>, StoreError> {
        self.check_reachable()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(lock(&self.orders).values().rev().take(limit).cloned().collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_reachable()
    }
}

// =============================================================================
// Mailer
// =============================================================================

/// Mailer that records messages instead of sending them.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<MailMessage>>,
    failing_recipients: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    failing: AtomicBool,
}

impl MemoryMailer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages accepted so far, in send order.
    pub fn sent(&self) -> Vec<MailMessage> {
        lock(&self.sent).clone()
    }

    /// Reject messages to one address.
    pub fn fail_for(&self, email: &str) {
        lock(&self.failing_recipients).insert(email.to_owned());
    }

    /// Reject every message.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Delay every send.
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = Some(delay);
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let delay = *lock(&self.delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst)
            || lock(&self.failing_recipients).contains(&message.to.email)
        {
            return Err(MailError::Delivery(format!("rejected {}", message.to.email)));
        }
        lock(&self.sent).push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_starts_at_first_number() {
        let store = MemoryOrderStore::new();
        store.hold_reads(Arc::new(Barrier::new(1)), 1);
        assert_eq!(store.next_order_number().await.unwrap(), OrderNumber::FIRST);
        assert!(store.recent(10).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cart_cache_round_trips_payload() {
        let carts = MemoryCartCache::new();
        let id = CartId::parse("c").unwrap();
        carts.put(&id, &CompactCart::empty());
        assert_eq!(carts.get(&id).await.unwrap(), Some(br#"{"Products":[]}"#.to_vec()));
        assert_eq!(carts.reads(), 1);
    }
}
