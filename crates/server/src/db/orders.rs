//! Order repository.
//!
//! Orders are written once and never updated by this service. The
//! `order_number` primary key is what keeps two concurrent finalizations from
//! persisting the same number; see [`crate::services::allocator`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use sqlx::types::Json;

use order_processor_core::{Order, OrderNumber};

use super::StoreError;

/// Durable order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Highest persisted order number, `None` when no order exists.
    async fn max_order_number(&self) -> Result<Option<OrderNumber>, StoreError>;

    /// Smallest number strictly greater than every persisted order number.
    async fn next_order_number(&self) -> Result<OrderNumber, StoreError> {
        Ok(OrderNumber::after(self.max_order_number().await?))
    }

    /// Persist a finalized order.
    ///
    /// Fails with [`StoreError::Duplicate`] if the number is already taken.
    async fn insert(&self, order: Order) -> Result<Order, StoreError>;

    /// Look up one order by number.
    async fn find_by_number(&self, number: OrderNumber) -> Result<Option<Order>, StoreError>;

    /// Most recent orders, highest number first.
    async fn recent(&self, limit: u32) -> Result<Vec<Order>, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// `PostgreSQL` implementation of [`OrderStore`].
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    order_number: OrderNumber,
    document: Json<Order>,
}

impl DocumentRow {
    fn into_order(self) -> Result<Order, StoreError> {
        let order = self.document.0;
        if order.number() != self.order_number {
            return Err(StoreError::DataCorruption(format!(
                "row {} holds document for order {}",
                self.order_number,
                order.number()
            )));
        }
        Ok(order)
    }
}

impl PgOrderStore {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn max_order_number(&self) -> Result<Option<OrderNumber>, StoreError> {
        let max: Option<i64> =
            sqlx::query_scalar("SELECT MAX(order_number) FROM orders.order_document")
                .fetch_one(&self.pool)
                .await?;

        Ok(max.map(OrderNumber::new))
    }

    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        let number = order.number();
        let grand_total: Decimal = order.totals().grand_total;
        let created_at: DateTime<Utc> = order.header.date;

        sqlx::query(
            r"
            INSERT INTO orders.order_document
                (order_number, status, shop, grand_total, created_at, document)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(number)
        .bind(order.header.status.as_str())
        .bind(&order.header.shop)
        .bind(grand_total)
        .bind(created_at)
        .bind(Json(&order))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::Duplicate(number);
            }
            StoreError::Database(e)
        })?;

        Ok(order)
    }

    async fn find_by_number(&self, number: OrderNumber) -> Result<Option<Order>, StoreError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            r"
            SELECT order_number, document
            FROM orders.order_document
            WHERE order_number = $1
            ",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DocumentRow::into_order).transpose()
    }

    async fn recent(&self, limit: u32) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            r"
            SELECT order_number, document
            FROM orders.order_document
            ORDER BY order_number DESC
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DocumentRow::into_order).collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
