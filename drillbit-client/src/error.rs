//! Error types for the Drillbit client

use thiserror::Error;

/// Drillbit client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Create response did not match the endpoint contract
    #[error("Unexpected create response shape: expected {expected}")]
    UnexpectedShape { expected: &'static str },
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
