//! Order conversion: snapshot a cart into an order and empty the cart.
//!
//! # Atomicity
//!
//! With a [`Atomicity::Transactional`] order store the order insert and the
//! cart clear commit together inside [`OrderStore::create`]. With a
//! [`Atomicity::PerRecord`] store the cart is cleared afterwards, retried up
//! to [`CheckoutPolicy::clear_attempts`] times. If every attempt fails the
//! order still stands: a pending cart clear is recorded, the caller gets the
//! order with `cart_cleared == false`, and the sweeper finishes the job by
//! removing the ordered products from the cart.

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{instrument, warn};

use cartwheel_core::{OrderDraft, Price, PricingError, ProductId, UserId};

use super::catalog::Catalog;
use crate::db::{Atomicity, RepositoryError, Stores};
use crate::models::Order;

/// Pending clears handled per sweep.
const SWEEP_BATCH: u32 = 100;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Order total is too large")]
    TotalTooLarge,

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl From<PricingError> for CheckoutError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::EmptyCart => Self::EmptyCart,
            PricingError::UnknownProduct(id) => Self::ProductNotFound(id),
            PricingError::TotalTooLarge => Self::TotalTooLarge,
        }
    }
}

/// Retry behaviour for clearing the cart on a per-record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutPolicy {
    /// Total clear attempts, at least one.
    pub clear_attempts: u32,
    /// Delay before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            clear_attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// A placed order and whether the cart was emptied.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub order: Order,
    pub cart_cleared: bool,
}

pub struct CheckoutService<'a> {
    stores: &'a Stores,
    catalog: &'a Catalog,
    policy: CheckoutPolicy,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(stores: &'a Stores, catalog: &'a Catalog, policy: CheckoutPolicy) -> Self {
        Self {
            stores,
            catalog,
            policy,
        }
    }

    /// Convert the user's cart into a `Pending` order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::EmptyCart` when the cart has no lines,
    /// `CheckoutError::ProductNotFound` when a line's product has left the
    /// catalog and `CheckoutError::TotalTooLarge` when the total doesn't fit
    /// an order. No order is created in any of these cases.
    #[instrument(skip(self))]
    pub async fn place_order(&self, user: UserId) -> Result<CheckoutOutcome, CheckoutError> {
        let lines = self.stores.carts.lines(user).await?;
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let ids: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let unit_prices: HashMap<ProductId, Price> = self
            .catalog
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|(id, product)| (id, product.price))
            .collect();
        let draft = OrderDraft::from_cart(lines, &unit_prices)?;

        let order = self.stores.orders.create(user, &draft).await?;
        tracing::info!(order_id = %order.id, total = %order.total, "order placed");

        let cart_cleared = match self.stores.orders.atomicity() {
            Atomicity::Transactional => true,
            Atomicity::PerRecord => self.clear_cart(&order).await,
        };

        Ok(CheckoutOutcome {
            order,
            cart_cleared,
        })
    }

    /// Clear the cart with retries. On final failure, record a pending clear.
    async fn clear_cart(&self, order: &Order) -> bool {
        let attempts = self.policy.clear_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.stores.carts.clear(order.user_id).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(order_id = %order.id, attempt, error = %e, "cart clear failed");
                    last_error = e.to_string();
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.policy.backoff * attempt).await;
            }
        }

        if let Err(e) = self
            .stores
            .orders
            .record_pending_clear(order, &last_error)
            .await
        {
            let event_id = sentry::capture_error(&e);
            tracing::error!(
                order_id = %order.id,
                error = %e,
                sentry_event_id = %event_id,
                "Failed to record pending cart clear"
            );
        }

        false
    }
}

/// Result of one sweep over pending cart clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub resolved: usize,
    pub failed: usize,
}

/// Retry every pending cart clear once.
///
/// # Errors
///
/// Returns `RepositoryError` if the pending clears cannot be listed or a
/// resolved clear cannot be deleted.
pub async fn sweep_once(stores: &Stores) -> Result<SweepReport, RepositoryError> {
    let mut report = SweepReport::default();

    for pending in stores.orders.pending_clears(SWEEP_BATCH).await? {
        match stores
            .carts
            .remove_products(pending.user_id, &pending.product_ids)
            .await
        {
            Ok(()) => {
                stores.orders.resolve_pending_clear(pending.order_id).await?;
                report.resolved += 1;
            }
            Err(e) => {
                warn!(
                    order_id = %pending.order_id,
                    attempts = pending.attempts + 1,
                    error = %e,
                    "pending cart clear failed again"
                );
                stores
                    .orders
                    .note_clear_failure(pending.order_id, &e.to_string())
                    .await?;
                report.failed += 1;
            }
        }
    }

    Ok(report)
}

/// Run [`sweep_once`] every `every` until the returned task is aborted.
#[must_use]
pub fn spawn_sweeper(stores: Stores, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match sweep_once(&stores).await {
                Ok(report) if report != SweepReport::default() => {
                    tracing::info!(
                        resolved = report.resolved,
                        failed = report.failed,
                        "pending cart clear sweep"
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    let event_id = sentry::capture_error(&e);
                    tracing::error!(
                        error = %e,
                        sentry_event_id = %event_id,
                        "Pending cart clear sweep failed"
                    );
                }
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use cartwheel_core::Quantity;

    use super::*;
    use crate::db::{CartStore, MemoryStore, OrderStore, ProductStore};
    use crate::models::NewProduct;

    const NO_BACKOFF: CheckoutPolicy = CheckoutPolicy {
        clear_attempts: 3,
        backoff: Duration::ZERO,
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        stores: Stores,
        catalog: Catalog,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            Self {
                stores: Stores::memory(store.clone()),
                catalog: Catalog::new(store.clone()),
                store,
            }
        }

        async fn product(&self, cents: i64) -> ProductId {
            ProductStore::create(
                self.store.as_ref(),
                &NewProduct {
                    name: format!("Item {cents}"),
                    description: String::new(),
                    price: Price::from_cents(cents).unwrap(),
                    category: "Misc".to_string(),
                    images: vec![],
                },
            )
            .await
            .unwrap()
            .id
        }

        async fn add(&self, user: UserId, product: ProductId, quantity: u32) {
            CartStore::add(
                self.store.as_ref(),
                user,
                product,
                Quantity::new(quantity).unwrap(),
            )
            .await
            .unwrap();
        }

        fn checkout(&self) -> CheckoutService<'_> {
            CheckoutService::new(&self.stores, &self.catalog, NO_BACKOFF)
        }
    }

    #[tokio::test]
    async fn test_order_total_and_cart_emptied() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        let p1 = fx.product(1000).await;
        let p2 = fx.product(500).await;
        fx.add(user, p1, 2).await;
        fx.add(user, p2, 1).await;

        let outcome = fx.checkout().place_order(user).await.unwrap();

        assert!(outcome.cart_cleared);
        assert_eq!(outcome.order.total, Price::from_cents(2500).unwrap());
        assert_eq!(outcome.order.items.len(), 2);
        assert_eq!(outcome.order.items[0].product_id, p1);
        assert!(fx.store.lines(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_cart_creates_no_order() {
        let fx = Fixture::new();
        let user = UserId::new(1);

        let err = fx.checkout().place_order(user).await.unwrap_err();

        assert!(matches!(err, CheckoutError::EmptyCart));
        assert!(fx.store.list_for_user(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_total_creates_no_order() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        let priciest = fx.product(999_999_999_999).await;
        fx.add(user, priciest, 101).await;

        let err = fx.checkout().place_order(user).await.unwrap_err();

        assert!(matches!(err, CheckoutError::TotalTooLarge));
        assert!(fx.store.list_for_user(user).await.unwrap().is_empty());
        assert_eq!(fx.store.lines(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_price_change_does_not_touch_order_total() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        let p1 = fx.product(1000).await;
        fx.add(user, p1, 1).await;

        let outcome = fx.checkout().place_order(user).await.unwrap();
        fx.catalog
            .update(
                p1,
                &NewProduct {
                    name: "Item".to_string(),
                    description: String::new(),
                    price: Price::from_cents(9900).unwrap(),
                    category: "Misc".to_string(),
                    images: vec![],
                },
            )
            .await
            .unwrap();

        let stored = OrderStore::get(fx.store.as_ref(), outcome.order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.total, Price::from_cents(1000).unwrap());
    }

    #[tokio::test]
    async fn test_transient_clear_failure_is_retried() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        let p1 = fx.product(1000).await;
        fx.add(user, p1, 1).await;
        fx.store.fail_cart_clears(2);

        let outcome = fx.checkout().place_order(user).await.unwrap();

        assert!(outcome.cart_cleared);
        assert!(fx.store.pending_clears(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persistent_clear_failure_records_pending_clear() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        let p1 = fx.product(1000).await;
        fx.add(user, p1, 1).await;
        fx.store.fail_cart_clears(3);

        let outcome = fx.checkout().place_order(user).await.unwrap();

        assert!(!outcome.cart_cleared);
        assert_eq!(fx.store.list_for_user(user).await.unwrap().len(), 1);
        assert_eq!(fx.store.lines(user).await.unwrap().len(), 1);

        let pending = fx.store.pending_clears(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].order_id, outcome.order.id);
        assert_eq!(pending[0].product_ids, vec![p1]);
    }

    #[tokio::test]
    async fn test_sweeper_removes_only_ordered_products() {
        let fx = Fixture::new();
        let user = UserId::new(1);
        let p1 = fx.product(1000).await;
        let p2 = fx.product(200).await;
        fx.add(user, p1, 1).await;
        fx.store.fail_cart_clears(3);
        fx.checkout().place_order(user).await.unwrap();

        // Added after checkout; must survive the sweep.
        fx.add(user, p2, 4).await;

        fx.store.fail_cart_clears(1);
        let report = sweep_once(&fx.stores).await.unwrap();
        assert_eq!(report, SweepReport { resolved: 0, failed: 1 });
        assert_eq!(fx.store.pending_clears(10).await.unwrap()[0].attempts, 1);

        let report = sweep_once(&fx.stores).await.unwrap();
        assert_eq!(report, SweepReport { resolved: 1, failed: 0 });

        let lines = fx.store.lines(user).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_id, p2);
        assert!(fx.store.pending_clears(10).await.unwrap().is_empty());
    }
}
