//! Catalog product types.

use chrono::{DateTime, Utc};

use cartwheel_core::api::{ProductInput, ProductView};
use cartwheel_core::{Price, ProductId};

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[must_use]
    pub fn to_view(&self) -> ProductView {
        ProductView {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            price: self.price,
            category: self.category.clone(),
            images: self.images.clone(),
        }
    }
}

/// Fields for creating or replacing a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category: String,
    pub images: Vec<String>,
}

impl From<ProductInput> for NewProduct {
    fn from(input: ProductInput) -> Self {
        Self {
            name: input.name.trim().to_owned(),
            description: input.description,
            price: input.price,
            category: input.category.trim().to_owned(),
            images: input.images,
        }
    }
}

impl NewProduct {
    /// Check the fields a catalog entry can't do without.
    ///
    /// # Errors
    ///
    /// Returns the message to show when the name or category is blank.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("Product name is required");
        }
        if self.category.is_empty() {
            return Err("Category is required");
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn input(name: &str, category: &str) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            description: String::new(),
            price: Price::from_cents(999).unwrap(),
            category: category.to_string(),
            images: Vec::new(),
        }
    }

    #[test]
    fn test_input_is_trimmed() {
        let product = NewProduct::from(input("  Mug ", " kitchen "));
        assert_eq!(product.name, "Mug");
        assert_eq!(product.category, "kitchen");
        assert!(product.validate().is_ok());
    }

    #[test]
    fn test_blank_name_or_category_is_rejected() {
        assert_eq!(
            NewProduct::from(input("   ", "kitchen")).validate(),
            Err("Product name is required")
        );
        assert_eq!(
            NewProduct::from(input("Mug", "")).validate(),
            Err("Category is required")
        );
    }
}
