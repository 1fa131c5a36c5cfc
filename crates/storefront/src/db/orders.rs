//! Order repository for `PostgreSQL`.
//!
//! Orders are written in one transaction together with their lines and the
//! deletion of the owner's cart, so this store is [`Atomicity::Transactional`]
//! and checkout never needs the pending-clear path against it. The
//! pending-clear queries still work so a sweeper pointed at this store is
//! harmless.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use cartwheel_core::{
    LineItem, OrderDraft, OrderId, OrderStatus, Price, ProductId, Quantity, UserId,
};

use super::{Atomicity, OrderStore, RepositoryError};
use crate::models::{Order, PendingCartClear};

const ORDER_COLUMNS: &str = "id, user_id, total, status, created_at";

#[derive(FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    total: Price,
    status: OrderStatus,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Order {
        Order {
            id: self.id,
            user_id: self.user_id,
            items,
            total: self.total,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct OrderLineRow {
    order_id: OrderId,
    product_id: ProductId,
    quantity: Quantity,
}

#[derive(FromRow)]
struct PendingClearRow {
    order_id: OrderId,
    user_id: UserId,
    product_ids: Vec<ProductId>,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PendingClearRow> for PendingCartClear {
    type Error = RepositoryError;

    fn try_from(row: PendingClearRow) -> Result<Self, Self::Error> {
        let attempts = u32::try_from(row.attempts).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "negative attempt count {} for order {}",
                row.attempts, row.order_id
            ))
        })?;

        Ok(Self {
            order_id: row.order_id,
            user_id: row.user_id,
            product_ids: row.product_ids,
            attempts,
            last_error: row.last_error,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL` implementation of [`OrderStore`].
#[derive(Debug, Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the lines of `orders` and attach them, keeping `orders` in order.
    async fn with_lines(&self, orders: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<OrderId> = orders.iter().map(|o| o.id).collect();
        let rows: Vec<OrderLineRow> = sqlx::query_as(
            r"
            SELECT order_id, product_id, quantity
            FROM storefront.order_line
            WHERE order_id = ANY($1)
            ORDER BY order_id, position
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<OrderId, Vec<LineItem>> = HashMap::new();
        for row in rows {
            lines
                .entry(row.order_id)
                .or_default()
                .push(LineItem::new(row.product_id, row.quantity));
        }

        Ok(orders
            .into_iter()
            .map(|row| {
                let items = lines.remove(&row.id).unwrap_or_default();
                row.into_order(items)
            })
            .collect())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    fn atomicity(&self) -> Atomicity {
        Atomicity::Transactional
    }

    async fn create(&self, user: UserId, draft: &OrderDraft) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO storefront.order (user_id, total)
            VALUES ($1, $2)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(user)
        .bind(draft.total)
        .fetch_one(&mut *tx)
        .await?;

        let product_ids = draft.product_ids();
        let quantities: Vec<i32> = draft.lines.iter().map(|l| l.quantity.into()).collect();

        sqlx::query(
            r"
            INSERT INTO storefront.order_line (order_id, position, product_id, quantity)
            SELECT $1, t.ord::INTEGER, t.product_id, t.quantity
            FROM UNNEST($2::INTEGER[], $3::INTEGER[])
                 WITH ORDINALITY AS t(product_id, quantity, ord)
            ",
        )
        .bind(row.id)
        .bind(&product_ids)
        .bind(&quantities)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(user)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(row.into_order(draft.lines.clone()))
    }

    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM storefront.order
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        self.with_lines(rows).await
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(self.with_lines(vec![row]).await?.pop())
    }

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE storefront.order SET status = $2 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(RepositoryError::NotFound)?;
        self.with_lines(vec![row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    async fn record_pending_clear(
        &self,
        order: &Order,
        error: &str,
    ) -> Result<(), RepositoryError> {
        let product_ids: Vec<ProductId> = order.items.iter().map(|l| l.product_id).collect();

        sqlx::query(
            r"
            INSERT INTO storefront.pending_cart_clear (order_id, user_id, product_ids, last_error)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id)
            DO UPDATE SET last_error = EXCLUDED.last_error
            ",
        )
        .bind(order.id)
        .bind(order.user_id)
        .bind(&product_ids)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn pending_clears(&self, limit: u32) -> Result<Vec<PendingCartClear>, RepositoryError> {
        let rows: Vec<PendingClearRow> = sqlx::query_as(
            r"
            SELECT order_id, user_id, product_ids, attempts, last_error, created_at
            FROM storefront.pending_cart_clear
            ORDER BY created_at, order_id
            LIMIT $1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingCartClear::try_from).collect()
    }

    async fn note_clear_failure(
        &self,
        order: OrderId,
        error: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            UPDATE storefront.pending_cart_clear
            SET attempts = attempts + 1, last_error = $2
            WHERE order_id = $1
            ",
        )
        .bind(order)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn resolve_pending_clear(&self, order: OrderId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.pending_cart_clear WHERE order_id = $1")
            .bind(order)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
