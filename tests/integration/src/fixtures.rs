//! Test fixtures
//!
//! Reusable recorders and payload accessors for gateway tests.

use std::future::{ready, Ready};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use gateway_client::Envelope;
use tokio::sync::mpsc;

use crate::helpers::within;

/// Token used by [`crate::test_config`]
pub const TEST_TOKEN: &str = "test-token";

/// Session id handed out by the mock gateway
pub const SESSION_ID: &str = "session-1";

/// Channel-backed handler that forwards every envelope it receives
pub struct Recorder {
    receiver: mpsc::UnboundedReceiver<Arc<Envelope>>,
}

impl Recorder {
    /// Create a recorder and the handler to register with the client
    pub fn new() -> (Self, impl Fn(Arc<Envelope>) -> Ready<()> + Send + Sync + 'static) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handler = move |envelope: Arc<Envelope>| {
            let _ = sender.send(envelope);
            ready(())
        };
        (Self { receiver }, handler)
    }

    /// Next envelope seen by the handler
    pub async fn next(&mut self) -> Result<Arc<Envelope>> {
        within(self.receiver.recv())
            .await?
            .ok_or_else(|| anyhow!("recorder handler dropped"))
    }

    /// Number of envelopes already delivered and not yet consumed
    pub fn pending(&mut self) -> usize {
        let mut count = 0;
        while self.receiver.try_recv().is_ok() {
            count += 1;
        }
        count
    }
}

/// `session_id` and `seq` of a Resume envelope
pub fn resume_fields(envelope: &Envelope) -> Result<(String, u64)> {
    let d = envelope.d.as_ref().ok_or_else(|| anyhow!("Resume without payload"))?;
    let session_id = d["session_id"]
        .as_str()
        .ok_or_else(|| anyhow!("Resume without session_id"))?
        .to_string();
    let seq = d["seq"].as_u64().ok_or_else(|| anyhow!("Resume without seq"))?;
    Ok((session_id, seq))
}
