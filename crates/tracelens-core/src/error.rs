//! Error type shared across the data-source seam.

use thiserror::Error;

/// Errors raised while fetching from, or commanding, a data source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// The request never produced a response (connect, timeout, TLS).
    #[error("Request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// A payload could not be decoded into the expected shape.
    #[error("Failed to decode payload: {0}")]
    Decode(String),

    /// The entity addressed by a command does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// WebSocket handshake or transport failure.
    #[error("Channel error: {0}")]
    Channel(String),

    /// The command was rejected before reaching the backend.
    #[error("Invalid request: {0}")]
    Invalid(String),
}

impl ClientError {
    /// True when the backend reported a missing entity.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_) | ClientError::Status { status: 404, .. })
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
