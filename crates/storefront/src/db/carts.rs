//! Cart repository for `PostgreSQL`.
//!
//! A cart is the set of `storefront.cart_line` rows for one user; there is no
//! separate cart row, so the cart exists as soon as its first line does.

use async_trait::async_trait;
use sqlx::PgPool;

use cartwheel_core::{LineItem, ProductId, Quantity, SetQuantityOutcome, UserId};

use super::{CartStore, RepositoryError};

/// `PostgreSQL` implementation of [`CartStore`].
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartStore {
    async fn lines(&self, user: UserId) -> Result<Vec<LineItem>, RepositoryError> {
        let rows: Vec<(ProductId, Quantity)> = sqlx::query_as(
            r"
            SELECT product_id, quantity
            FROM storefront.cart_line
            WHERE user_id = $1
            ORDER BY position
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| LineItem::new(product_id, quantity))
            .collect())
    }

    async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError> {
        // Single statement so concurrent adds of the same product commute.
        let (total,): (Quantity,) = sqlx::query_as(
            r"
            INSERT INTO storefront.cart_line (user_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = LEAST(
                storefront.cart_line.quantity::BIGINT + EXCLUDED.quantity,
                2147483647
            )::INTEGER
            RETURNING quantity
            ",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        requested: i64,
    ) -> Result<SetQuantityOutcome, RepositoryError> {
        let Some(quantity) = Quantity::clamped(requested) else {
            return if self.remove(user, product).await? {
                Ok(SetQuantityOutcome::Removed)
            } else {
                Err(RepositoryError::NotFound)
            };
        };

        let result = sqlx::query(
            r"
            UPDATE storefront.cart_line
            SET quantity = $3
            WHERE user_id = $1 AND product_id = $2
            ",
        )
        .bind(user)
        .bind(product)
        .bind(quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(SetQuantityOutcome::Updated(quantity))
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1 AND product_id = $2")
                .bind(user)
                .bind(product)
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self, user: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1")
            .bind(user)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn remove_products(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_line WHERE user_id = $1 AND product_id = ANY($2)")
            .bind(user)
            .bind(products)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
