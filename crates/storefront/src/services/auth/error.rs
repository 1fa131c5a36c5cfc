//! Authentication error types.

use thiserror::Error;

use super::token::TokenError;
use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Registration or profile input failed validation.
    #[error("{0}")]
    Invalid(String),

    /// Invalid credentials (wrong password or unknown email).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The token names a user that no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// Email already registered.
    #[error("user already exists")]
    UserAlreadyExists,

    /// No bearer token on a protected route.
    #[error("no token")]
    MissingToken,

    /// Bearer token rejected.
    #[error("token rejected: {0}")]
    Token(#[from] TokenError),

    /// Authenticated, but not an admin.
    #[error("admin access required")]
    Forbidden,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}
