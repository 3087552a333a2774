//! Client error types for robust error handling.

use thiserror::Error;

/// Errors surfaced by the live channels, the reservation protocol, and the
/// REST collaborators.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Malformed payload: {0}")]
    Parse(#[from] serde_json::Error),

    /// The caller is unauthenticated. Kept distinct from generic failures
    /// because the caller must redirect to a credential-entry flow instead of
    /// showing a retry message.
    #[error("Authentication required")]
    AuthRequired,

    /// The booking service rejected the request (slot no longer free,
    /// validation). Carries the server's message.
    #[error("Reservation rejected: {0}")]
    Rejected(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// True when the failure means "log in first", not "try again".
    pub fn is_auth_required(&self) -> bool {
        matches!(self, ClientError::AuthRequired)
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
