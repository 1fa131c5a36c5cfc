//! Line items and the cart merge policy.
//!
//! A cart is an ordered collection of [`LineItem`]s with at most one line per
//! product. Adding a product that is already present increments that line;
//! asking for a quantity below one removes it. The guest store, the in-memory
//! store and the `PostgreSQL` upsert all implement exactly this policy, and
//! the in-process implementations go through [`CartLines`] to do it.

use serde::{Deserialize, Serialize};

use crate::types::{ProductId, Quantity};

/// A single `(product, quantity)` entry in a cart or order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl LineItem {
    #[must_use]
    pub const fn new(product_id: ProductId, quantity: Quantity) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Result of [`CartLines::set_quantity`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetQuantityOutcome {
    /// The line now holds the requested quantity.
    Updated(Quantity),
    /// The requested quantity was below one and the line is gone.
    Removed,
}

/// Returned when a quantity change names a product that has no line.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("product {0} is not in the cart")]
pub struct LineNotFound(pub ProductId);

/// Cart contents with the one-line-per-product invariant enforced.
///
/// Insertion order is preserved; orders copy items in this order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<LineItem>", into = "Vec<LineItem>")]
pub struct CartLines {
    lines: Vec<LineItem>,
}

impl CartLines {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build from arbitrary lines, folding duplicate products together.
    pub fn from_lines(lines: impl IntoIterator<Item = LineItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            cart.add(line.product_id, line.quantity);
        }
        cart
    }

    /// Increment the product's line, or append a new one.
    ///
    /// Returns the line's quantity after the change.
    pub fn add(&mut self, product_id: ProductId, quantity: Quantity) -> Quantity {
        if let Some(line) = self.line_mut(product_id) {
            line.quantity = line.quantity.saturating_add(quantity);
            line.quantity
        } else {
            self.lines.push(LineItem::new(product_id, quantity));
            quantity
        }
    }

    /// Set a line's quantity. Anything below one removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`LineNotFound`] when the product has no line.
    pub fn set_quantity(
        &mut self,
        product_id: ProductId,
        requested: i64,
    ) -> Result<SetQuantityOutcome, LineNotFound> {
        let Some(line) = self.line_mut(product_id) else {
            return Err(LineNotFound(product_id));
        };
        if let Some(quantity) = Quantity::clamped(requested) {
            line.quantity = quantity;
            Ok(SetQuantityOutcome::Updated(quantity))
        } else {
            self.remove(product_id);
            Ok(SetQuantityOutcome::Removed)
        }
    }

    /// Remove the product's line. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| line.product_id != product_id);
        self.lines.len() != before
    }

    /// Remove every line whose product is in `product_ids`.
    pub fn remove_all(&mut self, product_ids: &[ProductId]) {
        self.lines
            .retain(|line| !product_ids.contains(&line.product_id));
    }

    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<Quantity> {
        self.lines
            .iter()
            .find(|line| line.product_id == product_id)
            .map(|line| line.quantity)
    }

    /// Sum of quantities across all lines (the cart badge count).
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity.get()))
            .sum()
    }

    #[must_use]
    pub fn product_ids(&self) -> Vec<ProductId> {
        self.lines.iter().map(|line| line.product_id).collect()
    }

    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<LineItem> {
        self.lines
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut LineItem> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }
}

impl From<Vec<LineItem>> for CartLines {
    fn from(lines: Vec<LineItem>) -> Self {
        Self::from_lines(lines)
    }
}

impl From<CartLines> for Vec<LineItem> {
    fn from(cart: CartLines) -> Self {
        cart.lines
    }
}

/// A product saved to a wishlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub product_id: ProductId,
}

impl WishlistEntry {
    #[must_use]
    pub const fn new(product_id: ProductId) -> Self {
        Self { product_id }
    }
}

/// Wishlist contents; each product appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<WishlistEntry>", into = "Vec<WishlistEntry>")]
pub struct Wishlist {
    entries: Vec<WishlistEntry>,
}

impl Wishlist {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append the product unless it is already present.
    ///
    /// Returns `true` if the wishlist changed.
    pub fn add(&mut self, product_id: ProductId) -> bool {
        if self.contains(product_id) {
            return false;
        }
        self.entries.push(WishlistEntry::new(product_id));
        true
    }

    /// Remove the product. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: ProductId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.product_id != product_id);
        self.entries.len() != before
    }

    #[must_use]
    pub fn contains(&self, product_id: ProductId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.product_id == product_id)
    }

    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        &self.entries
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<WishlistEntry> {
        self.entries
    }
}

impl From<Vec<WishlistEntry>> for Wishlist {
    fn from(entries: Vec<WishlistEntry>) -> Self {
        let mut wishlist = Self::new();
        for entry in entries {
            wishlist.add(entry.product_id);
        }
        wishlist
    }
}

impl From<Wishlist> for Vec<WishlistEntry> {
    fn from(wishlist: Wishlist) -> Self {
        wishlist.entries
    }
}
