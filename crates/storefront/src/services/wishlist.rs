//! Server-side wishlist operations.

use thiserror::Error;
use tracing::instrument;

use cartwheel_core::api::{WishlistItemView, WishlistView};
use cartwheel_core::{ProductId, UserId};

use super::catalog::Catalog;
use crate::db::{RepositoryError, WishlistStore};

#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct WishlistService<'a> {
    wishlists: &'a dyn WishlistStore,
    catalog: &'a Catalog,
}

impl<'a> WishlistService<'a> {
    #[must_use]
    pub const fn new(wishlists: &'a dyn WishlistStore, catalog: &'a Catalog) -> Self {
        Self { wishlists, catalog }
    }

    /// The user's wishlist with product details.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::Repository` if a store fails.
    pub async fn view(&self, user: UserId) -> Result<WishlistView, WishlistError> {
        let entries = self.wishlists.entries(user).await?;
        let ids: Vec<ProductId> = entries.iter().map(|e| e.product_id).collect();
        let products = self.catalog.get_many(&ids).await?;

        let items = entries
            .into_iter()
            .filter_map(|entry| {
                products
                    .get(&entry.product_id)
                    .map(|product| WishlistItemView {
                        product_id: entry.product_id,
                        product: product.to_view(),
                    })
            })
            .collect();

        Ok(WishlistView { items })
    }

    /// Add a product; adding one that is already present changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::ProductNotFound` for an unknown product.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user: UserId,
        product_id: ProductId,
    ) -> Result<WishlistView, WishlistError> {
        if self.catalog.get(product_id).await?.is_none() {
            return Err(WishlistError::ProductNotFound(product_id));
        }

        self.wishlists.add(user, product_id).await?;
        self.view(user).await
    }

    /// Remove a product. Removing an absent entry is not an error.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::Repository` if a store fails.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user: UserId,
        product_id: ProductId,
    ) -> Result<WishlistView, WishlistError> {
        self.wishlists.remove(user, product_id).await?;
        self.view(user).await
    }
}
