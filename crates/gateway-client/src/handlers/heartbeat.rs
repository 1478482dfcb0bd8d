//! Heartbeat handlers (op 1 from the server, op 11)

use super::{Flow, HandlerContext, HandlerError, HandlerResult};
use crate::heartbeat::AckTracker;
use crate::protocol::Envelope;
use std::future::{ready, Ready};
use std::sync::Arc;

/// Handles heartbeat traffic from the server
pub(crate) struct HeartbeatHandler;

impl HeartbeatHandler {
    /// The server asked for a heartbeat right away
    pub(crate) fn handle_request(ctx: &HandlerContext<'_>) -> HandlerResult<Flow> {
        tracing::debug!("Server requested heartbeat");
        if ctx.heartbeat_target().beat() {
            Ok(Flow::Continue)
        } else {
            Err(HandlerError::QueueClosed)
        }
    }

    /// Registration handler that records heartbeat acknowledgements
    pub(crate) fn ack_handler(acks: Arc<AckTracker>) -> impl Fn(Arc<Envelope>) -> Ready<()> + Send + Sync + 'static {
        move |_| {
            if let Some(latency) = acks.record_ack() {
                tracing::trace!(latency_ms = latency.as_millis() as u64, "Heartbeat acknowledged");
            }
            ready(())
        }
    }
}
