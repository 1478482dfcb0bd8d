//! REST error types

use thiserror::Error;

/// REST call failure
#[derive(Debug, Error)]
pub enum RestError {
    /// Transport failure, timeout or body read error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response; carries the response body
    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not the expected JSON
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The token cannot be used as a header value
    #[error("Invalid token for Authorization header")]
    InvalidToken,

    /// Path longer than the API accepts
    #[error("Path too long: {0} characters")]
    PathTooLong(usize),
}

impl RestError {
    /// HTTP status of a non-2xx response
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
