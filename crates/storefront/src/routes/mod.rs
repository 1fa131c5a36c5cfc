//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (database reachable)
//!
//! # Auth (register/login are strictly rate limited)
//! POST   /api/auth/register         - Create account, returns token
//! POST   /api/auth/login            - Returns token
//! GET    /api/auth/me               - Current user
//! GET    /api/auth/profile          - Current user as {user}
//! PUT    /api/auth/profile          - Update name/email/password
//!
//! # Products (writes require admin)
//! GET    /api/products              - List, ?category= filter
//! POST   /api/products              - Create
//! GET    /api/products/{id}         - Detail
//! PUT    /api/products/{id}         - Replace
//! DELETE /api/products/{id}         - Delete
//!
//! # Cart (requires auth, every response is the whole cart)
//! GET    /api/cart                  - Lines with products
//! POST   /api/cart                  - Add {productId, quantity}
//! PUT    /api/cart/{productId}      - Set {quantity}; <= 0 removes
//! DELETE /api/cart/{productId}      - Remove line
//!
//! # Wishlist (requires auth)
//! GET    /api/wishlist              - {items}
//! POST   /api/wishlist              - Add {productId}
//! DELETE /api/wishlist/{productId}  - Remove
//!
//! # Orders (requires auth)
//! POST   /api/orders                - Check out the cart
//! GET    /api/orders                - Own orders, newest first
//! GET    /api/orders/{id}           - One order
//! PUT    /api/orders/{id}/status    - Fulfillment transition (admin)
//! ```

pub mod auth;
pub mod cart;
pub mod health;
pub mod orders;
pub mod products;
pub mod wishlist;

#[cfg(test)]
mod tests;

use axum::{
    Router,
    extract::Request,
    middleware,
    routing::{get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, json_rate_limit_body, request_id_middleware,
};
use crate::state::AppState;

/// Build the application router with its per-request middleware.
///
/// Sentry, CORS and trailing-slash normalisation are added by the binary.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes())
        .layer(middleware::map_response(json_rate_limit_body))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = tracing::field::Empty,
                user_id = tracing::field::Empty,
            )
        }))
        .with_state(state)
}

/// Everything under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", credential_routes().merge(account_routes()))
        .merge(
            Router::new()
                .nest("/products", product_routes())
                .nest("/cart", cart_routes())
                .nest("/wishlist", wishlist_routes())
                .nest("/orders", order_routes())
                .layer(api_rate_limiter()),
        )
}

/// Register and login, behind the strict limiter.
pub fn credential_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter())
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(auth::me))
        .route("/profile", get(auth::profile).put(auth::update_profile))
        .layer(api_rate_limiter())
}

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route(
            "/{id}",
            get(products::show)
                .put(products::update)
                .delete(products::delete),
        )
}

pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).post(cart::add))
        .route("/{product_id}", put(cart::update).delete(cart::remove))
}

pub fn wishlist_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(wishlist::show).post(wishlist::add))
        .route("/{product_id}", axum::routing::delete(wishlist::remove))
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index).post(orders::create))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", put(orders::update_status))
}
