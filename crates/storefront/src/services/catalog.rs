//! Product catalog with an in-process lookup cache.
//!
//! Single-product lookups (cart, wishlist and checkout paths) are cached
//! using `moka` (5-minute TTL). Admin mutations go through [`Catalog`] so the
//! cached entry is invalidated before the call returns.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{debug, instrument};

use cartwheel_core::ProductId;

use crate::db::{ProductStore, RepositoryError};
use crate::models::{NewProduct, Product};

const CACHE_TTL: Duration = Duration::from_secs(300);
const CACHE_CAPACITY: u64 = 10_000;

/// Cached front for a [`ProductStore`].
#[derive(Clone)]
pub struct Catalog {
    store: Arc<dyn ProductStore>,
    cache: Cache<ProductId, Product>,
}

impl Catalog {
    #[must_use]
    pub fn new(store: Arc<dyn ProductStore>) -> Self {
        let cache = Cache::builder()
            .max_capacity(CACHE_CAPACITY)
            .time_to_live(CACHE_TTL)
            .build();

        Self { store, cache }
    }

    /// List products, optionally filtered by category. Not cached.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Product>, RepositoryError> {
        self.store.list(category).await
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        if let Some(product) = self.cache.get(&id).await {
            debug!("Cache hit for product");
            return Ok(Some(product));
        }

        let product = self.store.get(id).await?;
        if let Some(product) = &product {
            self.cache.insert(id, product.clone()).await;
        }
        Ok(product)
    }

    /// Get every product among `ids` that exists, keyed by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    pub async fn get_many(
        &self,
        ids: &[ProductId],
    ) -> Result<HashMap<ProductId, Product>, RepositoryError> {
        let mut found = HashMap::with_capacity(ids.len());
        let mut missing = Vec::new();

        for &id in ids {
            if found.contains_key(&id) {
                continue;
            }
            match self.cache.get(&id).await {
                Some(product) => {
                    found.insert(id, product);
                }
                None => missing.push(id),
            }
        }

        if !missing.is_empty() {
            for product in self.store.get_many(&missing).await? {
                self.cache.insert(product.id, product.clone()).await;
                found.insert(product.id, product);
            }
        }

        Ok(found)
    }

    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let product = self.store.create(product).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Replace a product's fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product doesn't exist.
    #[instrument(skip(self, product))]
    pub async fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError> {
        let result = self.store.update(id, product).await;
        self.cache.invalidate(&id).await;
        result
    }

    /// Delete a product. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = self.store.delete(id).await;
        self.cache.invalidate(&id).await;
        result
    }
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}
