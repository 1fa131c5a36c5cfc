//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{MemoryStore, Stores};
use crate::services::auth::{AuthService, TokenSigner};
use crate::services::cart::CartService;
use crate::services::catalog::Catalog;
use crate::services::checkout::{CheckoutPolicy, CheckoutService};
use crate::services::orders::OrderService;
use crate::services::wishlist::WishlistService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the stores and the token signer.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    stores: Stores,
    catalog: Catalog,
    tokens: TokenSigner,
    checkout: CheckoutPolicy,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create state backed by `PostgreSQL`.
    #[must_use]
    pub fn new(config: &StorefrontConfig, pool: PgPool) -> Self {
        let tokens = TokenSigner::new(config.token_secret.clone(), config.token_ttl);
        let checkout = CheckoutPolicy {
            clear_attempts: config.checkout_clear_attempts,
            ..CheckoutPolicy::default()
        };
        Self::build(Stores::postgres(pool.clone()), tokens, checkout, Some(pool))
    }

    /// Create state backed by a [`MemoryStore`].
    ///
    /// Readiness always reports OK since there is nothing external to reach.
    #[must_use]
    pub fn in_memory(
        store: Arc<MemoryStore>,
        token_secret: SecretString,
        checkout: CheckoutPolicy,
    ) -> Self {
        let tokens = TokenSigner::new(token_secret, Duration::from_secs(3600));
        Self::build(Stores::memory(store), tokens, checkout, None)
    }

    fn build(
        stores: Stores,
        tokens: TokenSigner,
        checkout: CheckoutPolicy,
        pool: Option<PgPool>,
    ) -> Self {
        let catalog = Catalog::new(stores.products.clone());
        Self {
            inner: Arc::new(AppStateInner {
                stores,
                catalog,
                tokens,
                checkout,
                pool,
            }),
        }
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.inner.stores
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenSigner {
        &self.inner.tokens
    }

    /// The database pool, when backed by `PostgreSQL`.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self.inner.stores.users.as_ref(), &self.inner.tokens)
    }

    #[must_use]
    pub fn carts(&self) -> CartService<'_> {
        CartService::new(self.inner.stores.carts.as_ref(), &self.inner.catalog)
    }

    #[must_use]
    pub fn wishlists(&self) -> WishlistService<'_> {
        WishlistService::new(self.inner.stores.wishlists.as_ref(), &self.inner.catalog)
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(self.inner.stores.orders.as_ref(), &self.inner.catalog)
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(&self.inner.stores, &self.inner.catalog, self.inner.checkout)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("stores", &self.inner.stores)
            .field("tokens", &self.inner.tokens)
            .field("checkout", &self.inner.checkout)
            .finish_non_exhaustive()
    }
}
