//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Trailing-slash normalisation (wraps the whole router)
//! 2. Sentry layers (hub per request, HTTP transaction)
//! 3. CORS (only when an origin is configured)
//! 4. `TraceLayer` (request span with `request_id` and `user_id` fields)
//! 5. Request ID (reuse or generate `x-request-id`)
//! 6. Rate-limit body (plain 429 rewritten to `{"msg": ...}`)
//! 7. Rate limiting (governor, per route group)
//!
//! Authentication is not a layer: handlers take [`RequireAuth`] or
//! [`RequireAdmin`] as extractors.

pub mod auth;
pub mod cors;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireAuth};
pub use cors::cors_layer;
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, json_rate_limit_body};
pub use request_id::request_id_middleware;
