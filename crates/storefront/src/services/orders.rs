//! Order queries and fulfillment status changes.

use std::collections::HashMap;

use thiserror::Error;
use tracing::instrument;

use cartwheel_core::api::{OrderView, ProductView};
use cartwheel_core::{OrderId, OrderStatus, ProductId, UserId};

use super::catalog::Catalog;
use crate::db::{OrderStore, RepositoryError};
use crate::models::{CurrentUser, Order};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

pub struct OrderService<'a> {
    orders: &'a dyn OrderStore,
    catalog: &'a Catalog,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(orders: &'a dyn OrderStore, catalog: &'a Catalog) -> Self {
        Self { orders, catalog }
    }

    /// The user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if a store fails.
    pub async fn list(&self, user: UserId) -> Result<Vec<OrderView>, OrderError> {
        let orders = self.orders.list_for_user(user).await?;
        self.render(&orders).await
    }

    /// One order. Customers only see their own; admins see any.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` when the order doesn't exist or belongs
    /// to someone else.
    #[instrument(skip(self))]
    pub async fn get(&self, caller: CurrentUser, id: OrderId) -> Result<OrderView, OrderError> {
        let order = self
            .orders
            .get(id)
            .await?
            .filter(|o| o.user_id == caller.id || caller.is_admin())
            .ok_or(OrderError::NotFound(id))?;

        self.render_one(&order).await
    }

    /// Move an order along the fulfillment lifecycle.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::NotFound` for an unknown order and
    /// `OrderError::InvalidTransition` when `status` is not reachable from
    /// the current one.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<OrderView, OrderError> {
        let current = self.orders.get(id).await?.ok_or(OrderError::NotFound(id))?;
        if !current.status.can_transition_to(status) {
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to: status,
            });
        }

        let order = self
            .orders
            .update_status(id, status)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => OrderError::NotFound(id),
                other => OrderError::Repository(other),
            })?;
        tracing::info!(order_id = %id, %status, "order status changed");

        self.render_one(&order).await
    }

    /// Render an order that has already been committed.
    ///
    /// A catalog failure here must not turn a placed order into an error
    /// response, so the lines come back without product details instead.
    pub async fn render_placed(&self, order: &Order) -> OrderView {
        match self.render_one(order).await {
            Ok(view) => view,
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "rendering order without product details");
                order.to_view(&HashMap::new())
            }
        }
    }

    /// Attach product details to one order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Repository` if the catalog fails.
    pub async fn render_one(&self, order: &Order) -> Result<OrderView, OrderError> {
        let mut views = self.render(std::slice::from_ref(order)).await?;
        views.pop().ok_or(OrderError::NotFound(order.id))
    }

    async fn render(&self, orders: &[Order]) -> Result<Vec<OrderView>, OrderError> {
        let ids: Vec<ProductId> = orders
            .iter()
            .flat_map(|o| o.items.iter().map(|l| l.product_id))
            .collect();
        let products: HashMap<ProductId, ProductView> = self
            .catalog
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|(id, product)| (id, product.to_view()))
            .collect();

        Ok(orders.iter().map(|o| o.to_view(&products)).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use cartwheel_core::{LineItem, OrderDraft, Price, Quantity, UserRole};

    use super::*;
    use crate::db::{MemoryStore, ProductStore};
    use crate::models::NewProduct;

    async fn placed_order(store: &MemoryStore, user: UserId) -> Order {
        let product = ProductId::new(1);
        let draft = OrderDraft::from_cart(
            vec![LineItem::new(product, Quantity::ONE)],
            &HashMap::from([(product, Price::from_cents(100).unwrap())]),
        )
        .unwrap();
        OrderStore::create(store, user, &draft).await.unwrap()
    }

    fn customer(id: i32) -> CurrentUser {
        CurrentUser {
            id: UserId::new(id),
            role: UserRole::Customer,
        }
    }

    #[tokio::test]
    async fn test_other_users_order_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());
        let orders = OrderService::new(store.as_ref(), &catalog);
        let order = placed_order(&store, UserId::new(1)).await;

        assert!(orders.get(customer(1), order.id).await.is_ok());
        let err = orders.get(customer(2), order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));

        let admin = CurrentUser {
            id: UserId::new(2),
            role: UserRole::Admin,
        };
        assert!(orders.get(admin, order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_deleted_product_renders_without_details() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());
        let orders = OrderService::new(store.as_ref(), &catalog);
        let order = placed_order(&store, UserId::new(1)).await;

        let view = orders.get(customer(1), order.id).await.unwrap();
        assert_eq!(view.items.len(), 1);
        assert!(view.items[0].product.is_none());
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());
        let orders = OrderService::new(store.as_ref(), &catalog);
        let order = placed_order(&store, UserId::new(1)).await;

        let err = orders
            .update_status(order.id, OrderStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));

        let view = orders
            .update_status(order.id, OrderStatus::Processing)
            .await
            .unwrap();
        assert_eq!(view.status, OrderStatus::Processing);

        let err = orders
            .update_status(OrderId::new(404), OrderStatus::Processing)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_placed_order_renders_when_catalog_fails() {
        let store = Arc::new(MemoryStore::new());
        let catalog = Catalog::new(store.clone());
        let orders = OrderService::new(store.as_ref(), &catalog);
        let kite = ProductStore::create(
            store.as_ref(),
            &NewProduct {
                name: "Kite".to_owned(),
                description: String::new(),
                price: Price::from_cents(1250).unwrap(),
                category: "Toys".to_owned(),
                images: Vec::new(),
            },
        )
        .await
        .unwrap();
        let draft = OrderDraft::from_cart(
            vec![LineItem::new(kite.id, Quantity::new(2).unwrap())],
            &HashMap::from([(kite.id, kite.price)]),
        )
        .unwrap();
        let order = OrderStore::create(store.as_ref(), UserId::new(1), &draft)
            .await
            .unwrap();

        store.fail_product_reads(1);
        assert!(orders.render_one(&order).await.is_err());

        store.fail_product_reads(1);
        let view = orders.render_placed(&order).await;
        assert_eq!(view.id, order.id);
        assert_eq!(view.total, order.total);
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.items[0].product_id, kite.id);
        assert!(view.items[0].product.is_none());

        let view = orders.render_placed(&order).await;
        assert_eq!(view.items[0].product.as_ref().unwrap().name, "Kite");
    }
}
