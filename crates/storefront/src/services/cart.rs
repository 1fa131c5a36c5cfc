//! Server-side cart operations.
//!
//! Thin layer over [`CartStore`]: validates the requested quantity, checks
//! the product exists and renders the cart with product details after every
//! mutation.

use thiserror::Error;
use tracing::instrument;

use cartwheel_core::api::CartLineView;
use cartwheel_core::{ProductId, Quantity, QuantityError, UserId};

use super::catalog::Catalog;
use crate::db::{CartStore, RepositoryError};

/// Errors from cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Add was asked for a quantity below one.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("product {0} is not in the cart")]
    LineNotFound(ProductId),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart operations for one request.
pub struct CartService<'a> {
    carts: &'a dyn CartStore,
    catalog: &'a Catalog,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(carts: &'a dyn CartStore, catalog: &'a Catalog) -> Self {
        Self { carts, catalog }
    }

    /// The user's cart with product details, in insertion order.
    ///
    /// Lines whose product has left the catalog are omitted.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a store fails.
    pub async fn view(&self, user: UserId) -> Result<Vec<CartLineView>, CartError> {
        let lines = self.carts.lines(user).await?;
        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let products = self.catalog.get_many(&ids).await?;

        Ok(lines
            .into_iter()
            .filter_map(|line| {
                products.get(&line.product_id).map(|product| CartLineView {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    product: product.to_view(),
                })
            })
            .collect())
    }

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a quantity below one and
    /// `CartError::ProductNotFound` for an unknown product.
    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLineView>, CartError> {
        let quantity = Quantity::try_from(quantity)?;
        self.require_product(product_id).await?;

        let total = self.carts.add(user, product_id, quantity).await?;
        tracing::debug!(%total, "cart line updated");

        self.view(user).await
    }

    /// Set a line's quantity; anything below one removes the line.
    ///
    /// # Errors
    ///
    /// Returns `CartError::LineNotFound` when the product is not in the cart.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        user: UserId,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<CartLineView>, CartError> {
        self.carts
            .set_quantity(user, product_id, quantity)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => CartError::LineNotFound(product_id),
                other => CartError::Repository(other),
            })?;

        self.view(user).await
    }

    /// Remove a line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a store fails.
    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user: UserId,
        product_id: ProductId,
    ) -> Result<Vec<CartLineView>, CartError> {
        self.carts.remove(user, product_id).await?;
        self.view(user).await
    }

    async fn require_product(&self, product_id: ProductId) -> Result<(), CartError> {
        self.catalog
            .get(product_id)
            .await?
            .map(|_| ())
            .ok_or(CartError::ProductNotFound(product_id))
    }
}
