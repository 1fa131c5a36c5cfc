//! Wishlist repository for `PostgreSQL`.

use async_trait::async_trait;
use sqlx::PgPool;

use cartwheel_core::{ProductId, UserId, WishlistEntry};

use super::{RepositoryError, WishlistStore};

/// `PostgreSQL` implementation of [`WishlistStore`].
#[derive(Debug, Clone)]
pub struct PgWishlistStore {
    pool: PgPool,
}

impl PgWishlistStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WishlistStore for PgWishlistStore {
    async fn entries(&self, user: UserId) -> Result<Vec<WishlistEntry>, RepositoryError> {
        let ids: Vec<ProductId> = sqlx::query_scalar(
            r"
            SELECT product_id
            FROM storefront.wishlist_entry
            WHERE user_id = $1
            ORDER BY position
            ",
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(WishlistEntry::new).collect())
    }

    async fn add(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            INSERT INTO storefront.wishlist_entry (user_id, product_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, product_id) DO NOTHING
            ",
        )
        .bind(user)
        .bind(product)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM storefront.wishlist_entry WHERE user_id = $1 AND product_id = $2",
        )
        .bind(user)
        .bind(product)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
