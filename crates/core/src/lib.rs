//! Cartwheel Core - Shared types library.
//!
//! This crate provides the types used on both sides of the wire:
//! - `storefront` - REST API server persisting carts, wishlists and orders
//! - `client` - Typed API client with the guest store and login reconciliation
//! - `cli` - Command-line tools for migrations and catalog management
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no database
//! access, no HTTP clients. The cart merge policy lives here so the guest
//! store, the in-memory store and the `PostgreSQL` store all agree on it.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, quantities, emails and statuses
//! - [`cart`] - Line items, the cart merge policy and wishlist set semantics
//! - [`pricing`] - Order pricing from a cart snapshot
//! - [`api`] - JSON request and response schemas for the REST surface

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod pricing;
pub mod types;

pub use cart::{CartLines, LineItem, LineNotFound, SetQuantityOutcome, Wishlist, WishlistEntry};
pub use pricing::{OrderDraft, PricingError};
pub use types::*;
