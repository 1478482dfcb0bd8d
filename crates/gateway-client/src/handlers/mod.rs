//! Op code handlers
//!
//! Protocol-level reactions to inbound envelopes, run inline on the read pump
//! before the envelope is fanned out to registrations.

mod error;
mod heartbeat;
mod hello;
mod ready;
mod reconnect;

pub(crate) use error::{HandlerError, HandlerResult};
pub(crate) use heartbeat::HeartbeatHandler;
pub(crate) use hello::HelloHandler;
pub(crate) use ready::ReadyHandler;
pub(crate) use reconnect::ReconnectHandler;

use crate::connection::{ClientInner, Disconnect, OutboundQueue};
use crate::heartbeat::HeartbeatTarget;
use crate::protocol::{Envelope, OpCode};
use std::sync::Arc;
use tokio::sync::Notify;

/// What the read pump does after an envelope was handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Disconnect(Disconnect),
}

/// Per-connection view handed to handlers
pub(crate) struct HandlerContext<'a> {
    pub(crate) client: &'a ClientInner,
    pub(crate) outbound: &'a OutboundQueue,
    pub(crate) zombie: &'a Arc<Notify>,
}

impl HandlerContext<'_> {
    /// Heartbeat target bound to this connection
    pub(crate) fn heartbeat_target(&self) -> HeartbeatTarget {
        HeartbeatTarget {
            outbound: self.outbound.clone(),
            sequence: Arc::clone(&self.client.sequence),
            acks: Arc::clone(&self.client.acks),
            zombie: self
                .client
                .config
                .connection
                .zombie_detection
                .then(|| Arc::clone(self.zombie)),
        }
    }

    /// Enqueue an envelope on this connection
    pub(crate) fn send(&self, envelope: Envelope) -> HandlerResult<()> {
        self.outbound
            .send(envelope)
            .map_err(|_| HandlerError::QueueClosed)
    }
}

/// Route inbound envelopes to the protocol handlers
pub(crate) struct ProtocolHandler;

impl ProtocolHandler {
    /// Handle one inbound envelope
    pub(crate) fn handle(ctx: &HandlerContext<'_>, envelope: &Arc<Envelope>) -> HandlerResult<Flow> {
        match envelope.op {
            OpCode::Hello => HelloHandler::handle(ctx, envelope),
            OpCode::Dispatch => ReadyHandler::handle(ctx, envelope),
            OpCode::Heartbeat => HeartbeatHandler::handle_request(ctx),
            OpCode::Reconnect => Ok(ReconnectHandler::handle_reconnect()),
            OpCode::InvalidSession => ReconnectHandler::handle_invalid_session(envelope),
            // Acks are recorded through a registry registration
            OpCode::HeartbeatAck => Ok(Flow::Continue),
            op => {
                tracing::debug!(op = %op, "No protocol handler for op code");
                Ok(Flow::Continue)
            }
        }
    }
}
