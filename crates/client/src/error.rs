//! Client error types.

use thiserror::Error;

/// Errors from calling the storefront API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-success status other than 401.
    #[error("API error: {status} - {msg}")]
    Api { status: u16, msg: String },

    /// The server rejected the token (or there was none). The session is
    /// logged out when it sees this.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The request timed out; it may or may not have been applied. Re-query
    /// before retrying a mutation.
    #[error("request timed out, outcome unknown")]
    OutcomeUnknown,

    /// The request never got a usable answer.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl ClientError {
    /// HTTP status, when the server answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Unauthorized(_) => Some(401),
            Self::OutcomeUnknown | Self::Transport(_) => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::OutcomeUnknown
        } else {
            Self::Transport(err)
        }
    }
}

/// Errors from a guest storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,
}
