//! CORS for a single configured browser origin.

use axum::http::{HeaderValue, Method, header, header::InvalidHeaderValue};
use tower_http::cors::CorsLayer;

/// Allow `origin` to call the API with a bearer token.
///
/// # Errors
///
/// Returns `InvalidHeaderValue` if `origin` cannot be sent as a header.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::HeaderName::from_static("x-request-id")]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unsendable_origin() {
        assert!(cors_layer("http://localhost:3000").is_ok());
        assert!(cors_layer("http://bad\norigin").is_err());
    }
}
