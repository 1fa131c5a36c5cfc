//! Client session: token and user persistence, login and logout, and the
//! cart/wishlist counts a UI shows.
//!
//! Cart and wishlist operations go to the server when a token is present and
//! to the [`GuestStore`] otherwise. Counts only move after a confirmed
//! success. Any 401 from the server ends the session locally.

use std::sync::Arc;

use tracing::instrument;

use cartwheel_core::api::{
    CheckoutResponse, LoginRequest, OrderView, RegisterRequest, UserView, WishlistView,
};
use cartwheel_core::{LineItem, ProductId, Quantity, WishlistEntry};

use crate::api::StorefrontApi;
use crate::error::ClientError;
use crate::guest::{GuestStorage, GuestStore};
use crate::reconcile::{ReconcileError, ReconcileMode, ReconcileReport, reconcile};

pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

/// Badge counts for the cart and wishlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Sum of line quantities.
    pub cart: u64,
    /// Number of entries.
    pub wishlist: usize,
}

/// Result of a successful login or registration.
#[derive(Debug)]
pub struct SignedIn {
    pub user: UserView,
    /// The guest merge. A failed merge does not undo the login.
    pub reconciliation: Result<ReconcileReport, ReconcileError>,
}

pub struct Session<A> {
    api: A,
    guest: GuestStore,
    mode: ReconcileMode,
    token: Option<String>,
    user: Option<UserView>,
    counts: Counts,
}

impl<A: StorefrontApi> Session<A> {
    /// Resume whatever session `storage` holds.
    ///
    /// Counts start at zero; call [`Session::refresh_counts`] to load them.
    pub fn restore(api: A, storage: Arc<dyn GuestStorage>, mode: ReconcileMode) -> Self {
        let guest = GuestStore::new(storage);
        let token = guest.load::<String>(TOKEN_KEY);
        let user = token.as_ref().and_then(|_| guest.load::<UserView>(USER_KEY));

        Self {
            api,
            guest,
            mode,
            token,
            user,
            counts: Counts::default(),
        }
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub const fn user(&self) -> Option<&UserView> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    #[must_use]
    pub const fn counts(&self) -> Counts {
        self.counts
    }

    #[must_use]
    pub const fn guest(&self) -> &GuestStore {
        &self.guest
    }

    #[must_use]
    pub const fn api(&self) -> &A {
        &self.api
    }

    /// Log in, then merge the guest cart and wishlist into the account.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the credentials are rejected or the account
    /// cannot be fetched; the session is logged out in the latter case.
    #[instrument(skip(self, password))]
    pub async fn login(&mut self, email: &str, password: &str) -> Result<SignedIn, ClientError> {
        let request = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let token = self.api.login(&request).await?.token;
        self.sign_in(token).await
    }

    /// Create an account and sign in as with [`Session::login`].
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if registration is rejected or the new account
    /// cannot be fetched.
    #[instrument(skip(self, password))]
    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<SignedIn, ClientError> {
        let request = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        let token = self.api.register(&request).await?.token;
        self.sign_in(token).await
    }

    async fn sign_in(&mut self, token: String) -> Result<SignedIn, ClientError> {
        self.guest.save(TOKEN_KEY, &token);
        self.token = Some(token.clone());

        let user = match self.api.me(&token).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(error = %e, "fetching the account after login failed");
                self.logout();
                return Err(e);
            }
        };
        self.guest.save(USER_KEY, &user);
        self.user = Some(user.clone());

        let reconciliation = reconcile(&self.api, &token, user.id, &self.guest, self.mode).await;
        if let Err(ReconcileError {
            source: ClientError::Unauthorized(_),
            ..
        }) = &reconciliation
        {
            self.logout();
        } else if let Err(e) = self.refresh_counts().await {
            tracing::warn!(error = %e, "refreshing counts after login failed");
        }

        Ok(SignedIn {
            user,
            reconciliation,
        })
    }

    /// Forget the token and user. Guest state is untouched.
    pub fn logout(&mut self) {
        self.guest.discard(TOKEN_KEY);
        self.guest.discard(USER_KEY);
        self.token = None;
        self.user = None;
        self.counts = Counts::default();
    }

    /// Reload both counts from wherever the cart and wishlist live.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server cannot be reached.
    pub async fn refresh_counts(&mut self) -> Result<Counts, ClientError> {
        let cart = self.cart().await?;
        let wishlist = self.wishlist().await?;
        self.counts = Counts {
            cart: cart_count(&cart),
            wishlist: wishlist.len(),
        };
        Ok(self.counts)
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails.
    pub async fn cart(&mut self) -> Result<Vec<LineItem>, ClientError> {
        let Some(token) = self.token.clone() else {
            return Ok(self.guest.cart());
        };
        let result = self.api.cart(&token).await;
        let lines = self.observe(result)?;
        Ok(lines.iter().map(|l| l.line()).collect())
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails; the cart count is
    /// left as it was.
    pub async fn add_to_cart(
        &mut self,
        product_id: ProductId,
        quantity: Quantity,
    ) -> Result<Vec<LineItem>, ClientError> {
        let lines = match self.token.clone() {
            Some(token) => {
                let result = self.api.add_to_cart(&token, product_id, quantity).await;
                self.observe(result)?.iter().map(|l| l.line()).collect()
            }
            None => self.guest.add_to_cart(product_id, quantity),
        };
        self.counts.cart = cart_count(&lines);
        Ok(lines)
    }

    /// Set a line's quantity; below one removes the line.
    ///
    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails.
    pub async fn set_cart_quantity(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<Vec<LineItem>, ClientError> {
        let lines = match self.token.clone() {
            Some(token) => {
                let result = self
                    .api
                    .set_cart_quantity(&token, product_id, quantity)
                    .await;
                self.observe(result)?.iter().map(|l| l.line()).collect()
            }
            None => self.guest.set_cart_quantity(product_id, quantity),
        };
        self.counts.cart = cart_count(&lines);
        Ok(lines)
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails.
    pub async fn remove_from_cart(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<LineItem>, ClientError> {
        let lines = match self.token.clone() {
            Some(token) => {
                let result = self.api.remove_from_cart(&token, product_id).await;
                self.observe(result)?.iter().map(|l| l.line()).collect()
            }
            None => self.guest.remove_from_cart(product_id),
        };
        self.counts.cart = cart_count(&lines);
        Ok(lines)
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails.
    pub async fn wishlist(&mut self) -> Result<Vec<WishlistEntry>, ClientError> {
        let Some(token) = self.token.clone() else {
            return Ok(self.guest.wishlist());
        };
        let result = self.api.wishlist(&token).await;
        Ok(wishlist_entries(&self.observe(result)?))
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails.
    pub async fn add_to_wishlist(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<WishlistEntry>, ClientError> {
        let entries = match self.token.clone() {
            Some(token) => {
                let result = self.api.add_to_wishlist(&token, product_id).await;
                wishlist_entries(&self.observe(result)?)
            }
            None => self.guest.add_to_wishlist(product_id),
        };
        self.counts.wishlist = entries.len();
        Ok(entries)
    }

    /// # Errors
    ///
    /// Returns `ClientError` if the server call fails.
    pub async fn remove_from_wishlist(
        &mut self,
        product_id: ProductId,
    ) -> Result<Vec<WishlistEntry>, ClientError> {
        let entries = match self.token.clone() {
            Some(token) => {
                let result = self.api.remove_from_wishlist(&token, product_id).await;
                wishlist_entries(&self.observe(result)?)
            }
            None => self.guest.remove_from_wishlist(product_id),
        };
        self.counts.wishlist = entries.len();
        Ok(entries)
    }

    /// Check out the server cart.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` without a token, or whatever the
    /// server call fails with.
    pub async fn place_order(&mut self) -> Result<CheckoutResponse, ClientError> {
        let token = self.require_token()?;
        let result = self.api.place_order(&token).await;
        let response = self.observe(result)?;

        if response.warning.is_some() {
            // The server still holds some lines; ask rather than guess.
            if let Err(e) = self.refresh_counts().await {
                tracing::warn!(error = %e, "refreshing counts after checkout failed");
            }
        } else {
            self.counts.cart = 0;
        }
        Ok(response)
    }

    /// # Errors
    ///
    /// Returns `ClientError::Unauthorized` without a token, or whatever the
    /// server call fails with.
    pub async fn orders(&mut self) -> Result<Vec<OrderView>, ClientError> {
        let token = self.require_token()?;
        let result = self.api.orders(&token).await;
        self.observe(result)
    }

    fn require_token(&self) -> Result<String, ClientError> {
        self.token
            .clone()
            .ok_or_else(|| ClientError::Unauthorized("No token, authorization denied".to_string()))
    }

    /// Log out on a 401, then pass the result through.
    fn observe<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Unauthorized(msg)) = &result {
            tracing::info!(%msg, "server rejected the token, logging out");
            self.logout();
        }
        result
    }
}

impl<A> std::fmt::Debug for Session<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("authenticated", &self.token.is_some())
            .field("user", &self.user.as_ref().map(|u| u.id))
            .field("counts", &self.counts)
            .finish_non_exhaustive()
    }
}

fn cart_count(lines: &[LineItem]) -> u64 {
    lines.iter().map(|l| u64::from(l.quantity.get())).sum()
}

fn wishlist_entries(view: &WishlistView) -> Vec<WishlistEntry> {
    view.items
        .iter()
        .map(|item| WishlistEntry::new(item.product_id))
        .collect()
}
