//! Hello handler (op 10)

use super::{Flow, HandlerContext, HandlerError, HandlerResult};
use crate::connection::{ClientInner, LifecycleState};
use crate::protocol::{Envelope, IdentifyPayload, Intents, ResumePayload};
use std::time::Duration;

/// Handles the Hello that opens every connection
pub(crate) struct HelloHandler;

impl HelloHandler {
    /// Send Identify or Resume and arm the heartbeat
    ///
    /// A Hello outside `AwaitingHello` is ignored so a duplicate never re-arms
    /// the scheduler or repeats the handshake.
    pub(crate) fn handle(ctx: &HandlerContext<'_>, envelope: &Envelope) -> HandlerResult<Flow> {
        let state = ctx.client.lifecycle.get();
        if state != LifecycleState::AwaitingHello {
            tracing::debug!(state = %state, "Duplicate Hello ignored");
            return Ok(Flow::Continue);
        }

        let hello = envelope.as_hello()?;
        if hello.heartbeat_interval == 0 {
            return Err(HandlerError::InvalidInterval(hello.heartbeat_interval));
        }

        ctx.send(Self::handshake(ctx.client)?)?;
        ctx.client.lifecycle.set(LifecycleState::Handshaking);

        ctx.client.heartbeat.arm(
            Duration::from_millis(hello.heartbeat_interval),
            ctx.heartbeat_target(),
        );

        Ok(Flow::Continue)
    }

    /// Resume if both a session and a sequence number are recorded, otherwise Identify
    fn handshake(client: &ClientInner) -> HandlerResult<Envelope> {
        let token = client.config.token.clone();

        let envelope = match (client.session.session_id(), client.sequence.current()) {
            (Some(session_id), Some(seq)) => {
                tracing::info!(session_id = %session_id, seq, "Resuming session");
                Envelope::resume(&ResumePayload {
                    token,
                    session_id,
                    seq,
                })?
            }
            _ => {
                let intents = Intents::from_bits_retain(client.config.intents);
                tracing::info!(intents = %intents, "Identifying new session");
                Envelope::identify(&IdentifyPayload {
                    token,
                    intents,
                    properties: (&client.config.identity).into(),
                })?
            }
        };

        Ok(envelope)
    }
}
