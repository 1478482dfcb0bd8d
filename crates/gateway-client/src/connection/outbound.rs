//! Outbound queue
//!
//! Every producer that writes on the socket goes through this queue; the write
//! pump is its only consumer.

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::Envelope;
use tokio::sync::mpsc;

/// Item waiting for the write pump
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    /// Serialize and send as a text frame
    Envelope(Envelope),
    /// Send a close frame with this code and stop the pump
    Close(u16),
}

/// Producer side of the outbound queue
#[derive(Debug, Clone)]
pub struct OutboundQueue {
    sender: mpsc::UnboundedSender<Outgoing>,
}

impl OutboundQueue {
    /// Create a queue and the receiver the write pump drains
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Enqueue an envelope
    pub fn send(&self, envelope: Envelope) -> GatewayResult<()> {
        self.sender
            .send(Outgoing::Envelope(envelope))
            .map_err(|_| GatewayError::NotConnected)
    }

    /// Enqueue a close frame; anything enqueued after it is never sent
    pub fn close(&self, code: u16) -> GatewayResult<()> {
        self.sender
            .send(Outgoing::Close(code))
            .map_err(|_| GatewayError::NotConnected)
    }

    /// Check whether the write pump has stopped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
