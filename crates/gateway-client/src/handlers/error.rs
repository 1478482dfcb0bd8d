//! Handler error types

use crate::protocol::DecodeError;
use thiserror::Error;

/// Per-envelope handling failure
///
/// Never fatal to the connection: the read pump logs it and moves on.
#[derive(Debug, Error)]
pub(crate) enum HandlerError {
    /// Payload does not match what the opcode requires
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] DecodeError),

    /// Hello carried an unusable heartbeat interval
    #[error("Invalid heartbeat interval: {0}ms")]
    InvalidInterval(u64),

    /// Outgoing envelope could not be built
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The write pump is gone
    #[error("Outbound queue closed")]
    QueueClosed,
}

/// Handler result type
pub(crate) type HandlerResult<T> = Result<T, HandlerError>;
