//! Order pricing from a cart snapshot.

use std::collections::HashMap;

use crate::cart::LineItem;
use crate::types::{Price, ProductId};

/// Errors from [`OrderDraft::from_cart`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingError {
    /// The cart has no lines.
    #[error("Cart is empty")]
    EmptyCart,
    /// A line references a product with no catalog price.
    #[error("product {0} not found")]
    UnknownProduct(ProductId),
    /// The total is larger than an order can hold.
    #[error("Order total is too large")]
    TotalTooLarge,
}

/// A priced but not yet persisted order.
///
/// The total is fixed here, from the unit prices in effect when the draft is
/// built. Orders never recompute it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub lines: Vec<LineItem>,
    pub total: Price,
}

impl OrderDraft {
    /// Price `lines` against `unit_prices`, preserving cart order.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::EmptyCart`] when `lines` is empty,
    /// [`PricingError::UnknownProduct`] for the first line without a price
    /// and [`PricingError::TotalTooLarge`] past [`Price::ORDER_TOTAL_MAX`].
    pub fn from_cart(
        lines: Vec<LineItem>,
        unit_prices: &HashMap<ProductId, Price>,
    ) -> Result<Self, PricingError> {
        if lines.is_empty() {
            return Err(PricingError::EmptyCart);
        }

        let mut total = Price::ZERO;
        for line in &lines {
            let unit = unit_prices
                .get(&line.product_id)
                .ok_or(PricingError::UnknownProduct(line.product_id))?;
            total = unit
                .line_total(line.quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .ok_or(PricingError::TotalTooLarge)?;
        }

        Ok(Self { lines, total })
    }

    /// Products covered by this draft, in cart order.
    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }
}
