//! Reconnect (op 7) and Invalid Session (op 9) handlers

use super::{Flow, HandlerResult};
use crate::connection::Disconnect;
use crate::protocol::Envelope;

/// Handles server requests to leave the current connection
pub(crate) struct ReconnectHandler;

impl ReconnectHandler {
    /// The server wants the client to reconnect and resume
    pub(crate) fn handle_reconnect() -> Flow {
        tracing::info!("Server requested reconnect");
        Flow::Disconnect(Disconnect::ReconnectRequested)
    }

    /// The payload says whether the session may be resumed
    pub(crate) fn handle_invalid_session(envelope: &Envelope) -> HandlerResult<Flow> {
        let resumable = envelope.as_invalid_session()?;
        tracing::warn!(resumable, "Session invalidated by server");
        Ok(Flow::Disconnect(Disconnect::InvalidSession { resumable }))
    }
}
