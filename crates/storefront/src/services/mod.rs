//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Registration, login, profile updates and bearer tokens
//! - `catalog` - Cached product lookups and admin mutations
//! - `cart` - Server cart operations
//! - `wishlist` - Server wishlist operations
//! - `checkout` - Order conversion and the pending cart clear sweeper
//! - `orders` - Order queries and fulfillment status changes
//!
//! Services borrow their stores for the length of one request; handlers build
//! them from [`crate::state::AppState`].

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;
pub mod wishlist;
