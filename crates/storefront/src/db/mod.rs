//! Persistence for the storefront.
//!
//! # Stores
//!
//! Each aggregate sits behind an `async_trait` store so handlers and
//! services never see which backend they talk to:
//!
//! - [`UserStore`] - accounts and password hashes
//! - [`ProductStore`] - the catalog
//! - [`CartStore`] - one cart per user, at most one line per product
//! - [`WishlistStore`] - one wishlist per user, at most one entry per product
//! - [`OrderStore`] - orders and pending cart clears
//!
//! Two backends implement all of them: `PostgreSQL` (schema `storefront`) and
//! an in-memory store used by tests and local experiments.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p cartwheel-cli -- migrate
//! ```

pub mod carts;
pub mod memory;
pub mod orders;
pub mod products;
pub mod users;
pub mod wishlists;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use cartwheel_core::{
    Email, LineItem, OrderDraft, OrderId, OrderStatus, ProductId, Quantity, SetQuantityOutcome,
    UserId, UserRole, WishlistEntry,
};

use crate::models::{NewProduct, Order, PendingCartClear, Product, ProfileChanges, User};

pub use memory::MemoryStore;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The backing store refused the operation.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Map a unique-constraint violation to [`RepositoryError::Conflict`].
pub(crate) fn conflict_on_unique(err: sqlx::Error, what: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(format!("{what} already exists"));
    }
    RepositoryError::Database(err)
}

/// How an [`OrderStore`] persists an order relative to clearing the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Atomicity {
    /// The order insert and the cart clear commit together or not at all.
    Transactional,
    /// The order is written first; clearing the cart is a separate step that
    /// can fail on its own.
    PerRecord,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user together with their password hash.
    ///
    /// Fails with [`RepositoryError::Conflict`] when the email is taken.
    async fn create_with_password(
        &self,
        name: &str,
        email: &Email,
        password_hash: &str,
    ) -> Result<User, RepositoryError>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError>;

    /// The user and their password hash, if both exist.
    async fn get_password_hash(
        &self,
        email: &Email,
    ) -> Result<Option<(User, String)>, RepositoryError>;

    /// Apply profile changes. Fails with `NotFound` or `Conflict` (email taken).
    async fn update_profile(
        &self,
        id: UserId,
        changes: &ProfileChanges,
    ) -> Result<User, RepositoryError>;

    async fn set_role(&self, email: &Email, role: UserRole) -> Result<User, RepositoryError>;

    /// Delete every account and everything owned by it. Returns the count.
    async fn delete_all(&self) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, optionally restricted to one category (case-insensitive).
    async fn list(&self, category: Option<&str>) -> Result<Vec<Product>, RepositoryError>;

    async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// The products among `ids` that exist, in no particular order.
    async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn create(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    async fn update(
        &self,
        id: ProductId,
        product: &NewProduct,
    ) -> Result<Product, RepositoryError>;

    /// Returns whether a product was deleted.
    async fn delete(&self, id: ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's lines in insertion order; empty when no cart exists.
    async fn lines(&self, user: UserId) -> Result<Vec<LineItem>, RepositoryError>;

    /// Increment-or-insert. Returns the line's quantity afterwards.
    async fn add(
        &self,
        user: UserId,
        product: ProductId,
        quantity: Quantity,
    ) -> Result<Quantity, RepositoryError>;

    /// Replace a line's quantity; below one removes the line.
    ///
    /// Fails with `NotFound` when the line does not exist.
    async fn set_quantity(
        &self,
        user: UserId,
        product: ProductId,
        requested: i64,
    ) -> Result<SetQuantityOutcome, RepositoryError>;

    /// Returns whether a line was removed.
    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError>;

    async fn clear(&self, user: UserId) -> Result<(), RepositoryError>;

    /// Remove the lines for `products`, leaving any others.
    async fn remove_products(
        &self,
        user: UserId,
        products: &[ProductId],
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait WishlistStore: Send + Sync {
    async fn entries(&self, user: UserId) -> Result<Vec<WishlistEntry>, RepositoryError>;

    /// Returns whether the entry was new.
    async fn add(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError>;

    /// Returns whether an entry was removed.
    async fn remove(&self, user: UserId, product: ProductId) -> Result<bool, RepositoryError>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    fn atomicity(&self) -> Atomicity;

    /// Persist an order with status `Pending`.
    ///
    /// A [`Atomicity::Transactional`] store also clears the user's cart in
    /// the same transaction; a [`Atomicity::PerRecord`] store only writes
    /// the order.
    async fn create(&self, user: UserId, draft: &OrderDraft) -> Result<Order, RepositoryError>;

    /// The user's orders, newest first.
    async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    async fn record_pending_clear(&self, order: &Order, error: &str)
    -> Result<(), RepositoryError>;

    /// Oldest pending clears first, at most `limit`.
    async fn pending_clears(&self, limit: u32) -> Result<Vec<PendingCartClear>, RepositoryError>;

    async fn note_clear_failure(
        &self,
        order: OrderId,
        error: &str,
    ) -> Result<(), RepositoryError>;

    async fn resolve_pending_clear(&self, order: OrderId) -> Result<(), RepositoryError>;
}

/// The full set of stores behind one backend.
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn UserStore>,
    pub products: Arc<dyn ProductStore>,
    pub carts: Arc<dyn CartStore>,
    pub wishlists: Arc<dyn WishlistStore>,
    pub orders: Arc<dyn OrderStore>,
}

impl Stores {
    /// `PostgreSQL`-backed stores sharing one pool.
    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(users::PgUserStore::new(pool.clone())),
            products: Arc::new(products::PgProductStore::new(pool.clone())),
            carts: Arc::new(carts::PgCartStore::new(pool.clone())),
            wishlists: Arc::new(wishlists::PgWishlistStore::new(pool.clone())),
            orders: Arc::new(orders::PgOrderStore::new(pool)),
        }
    }

    /// Stores backed by one shared [`MemoryStore`].
    #[must_use]
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            users: store.clone(),
            products: store.clone(),
            carts: store.clone(),
            wishlists: store.clone(),
            orders: store,
        }
    }
}

impl std::fmt::Debug for Stores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("atomicity", &self.orders.atomicity())
            .finish_non_exhaustive()
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
