//! Integration tests for Cartwheel.
//!
//! # Running Tests
//!
//! ```bash
//! # Start the database, migrate and seed a catalog
//! cartwheel migrate
//! cartwheel seed products catalog.yaml
//!
//! # Start the storefront, then run the ignored tests
//! cargo run -p cartwheel-storefront &
//! cargo test -p cartwheel-integration-tests -- --ignored
//! ```
//!
//! `STOREFRONT_BASE_URL` points the tests at another server
//! (default `http://127.0.0.1:5000`).
//!
//! Register and login share a per-IP limiter with a burst of 5, so the
//! helpers here wait and retry when they get a 429.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use cartwheel_client::{
    ClientConfig, ClientError, MemoryStorage, ReconcileMode, Session, SignedIn, StorefrontApi,
    StorefrontClient,
};
use cartwheel_core::api::{ProductQuery, ProductView};

/// Password that passes the registration policy.
pub const PASSWORD: &str = "CorrectHorse9!";

/// Base URL of the storefront under test.
#[must_use]
pub fn base_url() -> String {
    std::env::var("STOREFRONT_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:5000".to_string())
}

/// A client for the storefront under test.
///
/// # Panics
///
/// Panics if the HTTP client can't be built.
#[must_use]
pub fn client() -> StorefrontClient {
    StorefrontClient::new(&ClientConfig {
        base_url: base_url(),
        ..ClientConfig::default()
    })
    .expect("Failed to create storefront client")
}

/// A fresh guest session with in-memory storage.
#[must_use]
pub fn guest_session(mode: ReconcileMode) -> Session<StorefrontClient> {
    Session::restore(client(), Arc::new(MemoryStorage::new()), mode)
}

/// Retry `attempt` while the server answers 429.
///
/// # Errors
///
/// Returns the first error that isn't a rate limit, or the last 429.
pub async fn retry_rate_limited<T, F, Fut>(mut attempt: F) -> Result<T, ClientError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
{
    let mut tries = 0;
    loop {
        match attempt().await {
            Err(e) if e.status() == Some(429) && tries < 10 => {
                tries += 1;
                tokio::time::sleep(Duration::from_secs(6)).await;
            }
            result => return result,
        }
    }
}

/// Register a new account on `session`, waiting out the auth limiter.
///
/// # Panics
///
/// Panics if registration fails for any other reason.
pub async fn register(session: &mut Session<StorefrontClient>, name: &str) -> (String, SignedIn) {
    let email = unique_email();
    let mut tries = 0;
    loop {
        match session.register(name, &email, PASSWORD).await {
            Err(e) if e.status() == Some(429) && tries < 10 => {
                tries += 1;
                tokio::time::sleep(Duration::from_secs(6)).await;
            }
            result => return (email, result.expect("Failed to register")),
        }
    }
}

/// An email address no other test run has used.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", uuid::Uuid::new_v4().simple())
}

/// The first `n` products in the catalog.
///
/// # Panics
///
/// Panics if the catalog has fewer than `n` products.
pub async fn catalog_products(n: usize) -> Vec<ProductView> {
    let products = client()
        .products(&ProductQuery::default())
        .await
        .expect("Failed to list products");
    assert!(
        products.len() >= n,
        "catalog has {} products, need {n}; run `cartwheel seed products` first",
        products.len()
    );
    products.into_iter().take(n).collect()
}
