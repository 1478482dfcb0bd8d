//! Connection-level errors

use crate::protocol::OpCode;
use std::time::Duration;
use thiserror::Error;

/// Gateway client error
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Socket connect, read or write failure
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Hello not received in time after connecting
    #[error("Hello not received within {0:?}")]
    HandshakeTimeout(Duration),

    /// The session ended in a way that forbids reconnecting
    #[error("Fatal disconnect (close code {code:?}): {reason}")]
    Fatal { code: Option<u16>, reason: String },

    /// No live connection to write to
    #[error("Not connected")]
    NotConnected,

    /// Only client op codes may be sent on the gateway
    #[error("Op code {0} cannot be sent by the client")]
    NotClientOp(OpCode),

    /// `run` called while another `run` is active on the same client
    #[error("Client is already running")]
    AlreadyRunning,

    /// Envelope serialization failure
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl GatewayError {
    /// Close code carried by a fatal disconnect
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Fatal { code, .. } => *code,
            _ => None,
        }
    }
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;
