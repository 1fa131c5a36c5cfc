//! Cartwheel Storefront library.
//!
//! The REST API for accounts, the product catalog, carts, wishlists and
//! orders, exposed as a library so the router can be exercised in tests
//! against the in-memory store.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app;
