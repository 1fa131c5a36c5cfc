//! JSON request and response schemas for the storefront REST API.
//!
//! The storefront serializes these and the client deserializes them, so both
//! sides agree on field names (camelCase on the wire) without hand-written
//! JSON anywhere.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cart::LineItem;
use crate::types::{OrderId, OrderStatus, Price, ProductId, Quantity, UserId};

// =============================================================================
// Errors
// =============================================================================

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub msg: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Public view of a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Profile update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdated {
    pub user: UserView,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductList {
    pub products: Vec<ProductView>,
}

/// Create or replace a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    pub category: String,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

// =============================================================================
// Cart
// =============================================================================

const fn default_add_quantity() -> i64 {
    1
}

/// Quantity is signed so that non-positive requests reach validation
/// instead of failing JSON decoding with an opaque message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "default_add_quantity")]
    pub quantity: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

/// One cart line with its product resolved. The cart response is a JSON
/// array of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineView {
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub product: ProductView,
}

impl CartLineView {
    #[must_use]
    pub const fn line(&self) -> LineItem {
        LineItem::new(self.product_id, self.quantity)
    }
}

// =============================================================================
// Wishlist
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToWishlistRequest {
    pub product_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItemView {
    pub product_id: ProductId,
    pub product: ProductView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistView {
    pub items: Vec<WishlistItemView>,
}

// =============================================================================
// Orders
// =============================================================================

/// An ordered line. `product` is absent when the product has since been
/// removed from the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub product_id: ProductId,
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderLineView>,
    pub total: Price,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Non-fatal condition attached to a successful checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutWarning {
    /// The order was placed but the cart still holds its lines; they will
    /// be removed in the background.
    CartNotCleared,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order: OrderView,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<CheckoutWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_to_cart_defaults_quantity_to_one() {
        let req: AddToCartRequest = serde_json::from_str(r#"{"productId":3}"#).unwrap();
        assert_eq!(req.product_id, ProductId::new(3));
        assert_eq!(req.quantity, 1);
    }

    #[test]
    fn test_add_to_cart_accepts_non_positive_quantity() {
        let req: AddToCartRequest =
            serde_json::from_str(r#"{"productId":3,"quantity":-2}"#).unwrap();
        assert_eq!(req.quantity, -2);
    }

    #[test]
    fn test_checkout_warning_wire_name() {
        let json = serde_json::to_value(CheckoutWarning::CartNotCleared).unwrap();
        assert_eq!(json, "cart_not_cleared");
    }

    #[test]
    fn test_order_view_uses_camel_case() {
        let order = OrderView {
            id: OrderId::new(1),
            user_id: UserId::new(2),
            items: vec![OrderLineView {
                product_id: ProductId::new(3),
                quantity: Quantity::ONE,
                product: None,
            }],
            total: Price::from_cents(500).unwrap(),
            status: OrderStatus::Pending,
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_value(CheckoutResponse { order, warning: None }).unwrap();

        assert_eq!(json["order"]["userId"], 2);
        assert_eq!(json["order"]["items"][0]["productId"], 3);
        assert_eq!(json["order"]["total"], "5.00");
        assert_eq!(json["order"]["status"], "Pending");
        assert!(json.get("warning").is_none());
    }

    #[test]
    fn test_profile_update_fields_are_optional() {
        let req: UpdateProfileRequest = serde_json::from_str(r#"{"name":"Ada"}"#).unwrap();
        assert_eq!(req.name.as_deref(), Some("Ada"));
        assert!(req.email.is_none());
        assert!(req.password.is_none());
    }
}
