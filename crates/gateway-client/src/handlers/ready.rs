//! READY / RESUMED dispatch handler

use super::{Flow, HandlerContext, HandlerResult};
use crate::connection::LifecycleState;
use crate::protocol::{Envelope, READY_EVENT, RESUMED_EVENT};
use std::sync::Arc;

/// Completes the handshake
pub(crate) struct ReadyHandler;

impl ReadyHandler {
    /// Persist the session from READY and mark the connection ready
    ///
    /// Other dispatches pass through untouched.
    pub(crate) fn handle(ctx: &HandlerContext<'_>, envelope: &Arc<Envelope>) -> HandlerResult<Flow> {
        let client = ctx.client;

        if envelope.is_event(READY_EVENT) {
            let ready = envelope.as_ready()?;
            tracing::info!(
                session_id = %ready.session_id,
                resume_url = %ready.resume_gateway_url,
                "Session ready"
            );
            client.session.record(ready.session_id, ready.resume_gateway_url);
        } else if envelope.is_event(RESUMED_EVENT) {
            tracing::info!(
                session_id = ?client.session.session_id(),
                seq = ?client.sequence.current(),
                "Session resumed"
            );
        } else {
            return Ok(Flow::Continue);
        }

        *client.last_ready.lock() = Some(Arc::clone(envelope));
        client.lifecycle.set(LifecycleState::Ready);

        Ok(Flow::Continue)
    }
}
