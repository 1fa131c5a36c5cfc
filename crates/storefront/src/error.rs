//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Errors render as
//! `{"msg": "..."}` with the status from the table below; server errors are
//! captured to Sentry and logged, and clients only ever see "Server error".
//!
//! | Error | Status |
//! |---|---|
//! | missing, invalid or expired token, bad credentials | 401 |
//! | admin route with a non-admin token | 403 |
//! | unknown product, order or cart line | 404 |
//! | malformed input, quantity below one, empty cart | 400 |
//! | email already registered | 409 |
//! | rate limited | 429 |
//! | store failure | 500 |

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use cartwheel_core::api::ErrorBody;

use crate::db::RepositoryError;
use crate::services::auth::{AuthError, TokenError};
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::orders::OrderError;
use crate::services::wishlist::WishlistError;

const SERVER_ERROR: &str = "Server error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Store operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Wishlist error: {0}")]
    Wishlist(#[from] WishlistError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code and client-facing message.
    fn status_and_message(&self) -> (StatusCode, String) {
        let server_error = || (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR.to_string());

        match self {
            Self::Database(err) => repository_status(err).unwrap_or_else(server_error),
            Self::Auth(err) => match err {
                AuthError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
                }
                AuthError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
                AuthError::UserAlreadyExists => {
                    (StatusCode::CONFLICT, "User already exists".to_string())
                }
                AuthError::MissingToken => (
                    StatusCode::UNAUTHORIZED,
                    "No token, authorization denied".to_string(),
                ),
                AuthError::Token(TokenError::Expired) => (
                    StatusCode::UNAUTHORIZED,
                    "Token expired, please log in again".to_string(),
                ),
                AuthError::Token(TokenError::Malformed | TokenError::BadSignature) => {
                    (StatusCode::UNAUTHORIZED, "Token is not valid".to_string())
                }
                AuthError::Forbidden => {
                    (StatusCode::FORBIDDEN, "Admin access required".to_string())
                }
                AuthError::Token(TokenError::Signing(_))
                | AuthError::Repository(_)
                | AuthError::PasswordHash => server_error(),
            },
            Self::Cart(err) => match err {
                CartError::InvalidQuantity(_) => (
                    StatusCode::BAD_REQUEST,
                    "Quantity must be at least 1".to_string(),
                ),
                CartError::ProductNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Product not found".to_string())
                }
                CartError::LineNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Item not found in cart".to_string())
                }
                CartError::Repository(_) => server_error(),
            },
            Self::Wishlist(err) => match err {
                WishlistError::ProductNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Product not found".to_string())
                }
                WishlistError::Repository(_) => server_error(),
            },
            Self::Checkout(err) => match err {
                CheckoutError::EmptyCart => (StatusCode::BAD_REQUEST, "Cart is empty".to_string()),
                CheckoutError::ProductNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Product not found".to_string())
                }
                CheckoutError::TotalTooLarge => (
                    StatusCode::BAD_REQUEST,
                    "Order total is too large".to_string(),
                ),
                CheckoutError::Repository(_) => server_error(),
            },
            Self::Order(err) => match err {
                OrderError::NotFound(_) => (StatusCode::NOT_FOUND, "Order not found".to_string()),
                OrderError::InvalidTransition { from, to } => (
                    StatusCode::BAD_REQUEST,
                    format!("Cannot change order status from {from} to {to}"),
                ),
                OrderError::Repository(_) => server_error(),
            },
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found")),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later".to_string(),
            ),
            Self::Internal(_) => server_error(),
        }
    }
}

/// Repository errors that map to a client error rather than a 500.
fn repository_status(err: &RepositoryError) -> Option<(StatusCode, String)> {
    match err {
        RepositoryError::NotFound => Some((StatusCode::NOT_FOUND, "Not found".to_string())),
        RepositoryError::Conflict(what) => Some((StatusCode::CONFLICT, what.clone())),
        RepositoryError::Database(_)
        | RepositoryError::DataCorruption(_)
        | RepositoryError::Unavailable(_) => None,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(ErrorBody::new(message))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use cartwheel_core::{OrderId, OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    fn get_message(err: &AppError) -> String {
        err.status_and_message().1
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("Product".to_string());
        assert_eq!(err.to_string(), "Not found: Product");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(
            get_status(AuthError::MissingToken.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::Token(TokenError::Expired).into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AuthError::Forbidden.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AuthError::UserAlreadyExists.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AuthError::Invalid("bad".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_token_messages() {
        assert_eq!(
            get_message(&AuthError::MissingToken.into()),
            "No token, authorization denied"
        );
        assert_eq!(
            get_message(&AuthError::Token(TokenError::Expired).into()),
            "Token expired, please log in again"
        );
        assert_eq!(
            get_message(&AuthError::Token(TokenError::BadSignature).into()),
            "Token is not valid"
        );
    }

    #[test]
    fn test_domain_error_statuses() {
        assert_eq!(
            get_status(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_message(&CheckoutError::EmptyCart.into()),
            "Cart is empty"
        );
        assert_eq!(
            get_status(CheckoutError::TotalTooLarge.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CartError::LineNotFound(ProductId::new(1)).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_message(&OrderError::NotFound(OrderId::new(1)).into()),
            "Order not found"
        );
        assert_eq!(
            get_status(
                OrderError::InvalidTransition {
                    from: OrderStatus::Delivered,
                    to: OrderStatus::Pending,
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(get_status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
    }

    #[test]
    fn test_server_errors_hide_details() {
        let err: AppError =
            RepositoryError::Unavailable("connection refused at 10.0.0.5".to_string()).into();
        assert_eq!(get_message(&err), "Server error");
        assert_eq!(get_status(err), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = CartError::Repository(RepositoryError::DataCorruption(
            "bad row".to_string(),
        ))
        .into();
        assert_eq!(get_message(&err), "Server error");
    }
}
