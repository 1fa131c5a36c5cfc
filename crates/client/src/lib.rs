//! Cartwheel Client - the storefront as seen from a shopper's device.
//!
//! # Modules
//!
//! - [`api`] - The REST API as a mockable trait, and its `reqwest` implementation
//! - [`guest`] - Local Guest Store for visitors without a token
//! - [`reconcile`] - Merge of guest state into the account on login
//! - [`session`] - Token/user persistence, routing between guest and server, counts
//!
//! # Example
//!
//! ```rust,ignore
//! let api = StorefrontClient::new(&ClientConfig::default())?;
//! let storage = Arc::new(FileStorage::new("cartwheel-state.json"));
//! let mut session = Session::restore(api, storage, ReconcileMode::Journaled);
//!
//! session.add_to_cart(product_id, Quantity::ONE).await?;   // guest cart
//! session.login("ada@example.com", "Sup3r$ecret").await?;  // merged into the account
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod error;
pub mod guest;
pub mod reconcile;
pub mod session;

pub use api::{ClientConfig, StorefrontApi, StorefrontClient};
pub use error::{ClientError, StorageError};
pub use guest::{FileStorage, GuestStorage, GuestStore, MemoryStorage};
pub use reconcile::{ReconcileError, ReconcileMode, ReconcileReport, reconcile};
pub use session::{Counts, Session, SignedIn};
