//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from both database rows and
//! the wire schemas in `cartwheel_core::api`.

pub mod order;
pub mod product;
pub mod user;

pub use order::{Order, PendingCartClear};
pub use product::{NewProduct, Product};
pub use user::{CurrentUser, ProfileChanges, User};
