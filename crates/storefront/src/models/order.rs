//! Order types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use cartwheel_core::api::{OrderLineView, OrderView, ProductView};
use cartwheel_core::{LineItem, OrderId, OrderStatus, Price, ProductId, UserId};

/// A placed order.
///
/// `items` are in the cart's order at checkout; `total` was fixed from the
/// unit prices of that moment and is never recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Render with whichever products still exist in `products`.
    #[must_use]
    pub fn to_view(&self, products: &HashMap<ProductId, ProductView>) -> OrderView {
        OrderView {
            id: self.id,
            user_id: self.user_id,
            items: self
                .items
                .iter()
                .map(|line| OrderLineView {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    product: products.get(&line.product_id).cloned(),
                })
                .collect(),
            total: self.total,
            status: self.status,
            created_at: self.created_at,
        }
    }
}

/// Compensation record for an order whose cart could not be cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCartClear {
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Products to remove from the user's cart.
    pub product_ids: Vec<ProductId>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}
