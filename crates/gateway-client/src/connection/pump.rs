//! Socket pumps
//!
//! The write pump is the single writer on the socket. Inbound frames are turned
//! into envelopes here; malformed frames are logged and dropped.

use super::{Disconnect, Outgoing};
use crate::protocol::{DecodeError, Envelope};
use futures_util::{Sink, SinkExt};
use std::borrow::Cow;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

/// Drain the outbound queue into the socket sink
///
/// Ends when the queue closes, a close frame was written, or a write fails.
/// Returns true if every write succeeded.
pub async fn write_pump<S>(mut sink: S, mut receiver: mpsc::UnboundedReceiver<Outgoing>) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let mut healthy = true;

    while let Some(outgoing) = receiver.recv().await {
        match outgoing {
            Outgoing::Envelope(envelope) => {
                let json = match envelope.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::error!(op = %envelope.op, error = %e, "Failed to encode envelope");
                        continue;
                    }
                };

                tracing::trace!(op = %envelope.op, payload = %json, "Sending envelope");

                if let Err(e) = sink.send(Message::Text(json)).await {
                    tracing::warn!(error = %e, "Failed to write to socket");
                    healthy = false;
                    break;
                }
            }
            Outgoing::Close(code) => {
                tracing::debug!(close_code = code, "Sending close frame");
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: Cow::Borrowed(""),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, "Failed to send close frame");
                }
                break;
            }
        }
    }

    // Close the socket when the queue is done
    let _ = sink.close().await;
    healthy
}

/// Result of reading one frame
#[derive(Debug)]
pub enum Inbound {
    /// A decoded envelope
    Envelope(Envelope),
    /// Control frame or dropped malformed frame
    Skip,
    /// The connection ended
    Ended(Disconnect),
}

/// Interpret the next item from the socket stream
pub fn read_frame(frame: Option<Result<Message, WsError>>) -> Inbound {
    match frame {
        Some(Ok(Message::Text(text))) => match Envelope::decode(&text) {
            Ok(envelope) => {
                tracing::trace!(op = %envelope.op, t = ?envelope.t, s = ?envelope.s, payload = %text, "Received envelope");
                Inbound::Envelope(envelope)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed envelope");
                Inbound::Skip
            }
        },
        Some(Ok(Message::Binary(data))) => {
            let e = DecodeError::BinaryFrame(data.len());
            tracing::warn!(error = %e, "Dropping malformed envelope");
            Inbound::Skip
        }
        Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
            tracing::trace!("Control frame received");
            Inbound::Skip
        }
        Some(Ok(Message::Close(frame))) => {
            let code = frame.map(|f| u16::from(f.code));
            tracing::info!(close_code = ?code, "Server closed connection");
            Inbound::Ended(Disconnect::Closed(code))
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "WebSocket error");
            Inbound::Ended(Disconnect::SocketError(e.to_string()))
        }
        None => {
            tracing::info!("Socket stream ended");
            Inbound::Ended(Disconnect::Closed(None))
        }
    }
}
