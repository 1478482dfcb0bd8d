//! Single connection driver
//!
//! Runs one socket from AwaitingHello to Closing: spawns the write pump, reads
//! and handles envelopes in order, and tears everything down when the
//! connection ends for any reason.

use super::pump::{read_frame, write_pump, Inbound};
use super::{ClientInner, Disconnect, LifecycleState, OutboundQueue};
use crate::handlers::{Flow, HandlerContext, ProtocolHandler};
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{watch, Notify};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

/// Socket type produced by `connect_async`
pub type GatewaySocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bounded wait for the write pump to flush a close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How a connection ended
#[derive(Debug)]
pub struct ConnectionOutcome {
    pub disconnect: Disconnect,
    /// READY or RESUMED was received on this connection
    pub reached_ready: bool,
}

/// Resolve once shutdown is requested (or the client is gone)
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Drive one connection until it ends
pub async fn drive(
    client: &ClientInner,
    socket: GatewaySocket,
    shutdown: &mut watch::Receiver<bool>,
) -> ConnectionOutcome {
    let (sink, mut stream) = socket.split();
    let (outbound, receiver) = OutboundQueue::channel();
    let mut writer = tokio::spawn(write_pump(sink, receiver));

    client.acks.reset();
    *client.outbound.lock() = Some(outbound.clone());
    client.lifecycle.set(LifecycleState::AwaitingHello);

    let zombie = Arc::new(Notify::new());
    let ctx = HandlerContext {
        client,
        outbound: &outbound,
        zombie: &zombie,
    };

    let hello_timeout = client.config.connection.hello_timeout();
    let hello_deadline = tokio::time::sleep(hello_timeout);
    tokio::pin!(hello_deadline);

    let mut reached_ready = false;
    let mut writer_done = false;

    let disconnect = loop {
        tokio::select! {
            frame = stream.next() => match read_frame(frame) {
                Inbound::Envelope(envelope) => {
                    if let Some(seq) = envelope.s {
                        client.sequence.observe(seq);
                    }

                    let envelope = Arc::new(envelope);
                    let flow = match ProtocolHandler::handle(&ctx, &envelope) {
                        Ok(flow) => flow,
                        Err(e) => {
                            tracing::warn!(op = %envelope.op, error = %e, "Handler error, envelope skipped");
                            Flow::Continue
                        }
                    };

                    client.registry.dispatch(envelope);

                    if client.lifecycle.get() == LifecycleState::Ready {
                        reached_ready = true;
                    }
                    if let Flow::Disconnect(disconnect) = flow {
                        break disconnect;
                    }
                }
                Inbound::Skip => {}
                Inbound::Ended(disconnect) => break disconnect,
            },
            () = &mut hello_deadline, if client.lifecycle.get() == LifecycleState::AwaitingHello => {
                tracing::warn!(timeout_ms = hello_timeout.as_millis() as u64, "Hello not received in time");
                break Disconnect::HandshakeTimeout;
            }
            () = zombie.notified() => break Disconnect::Zombie,
            () = shutdown_requested(shutdown) => break Disconnect::Shutdown,
            result = &mut writer, if !writer_done => {
                writer_done = true;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Write pump task failed");
                }
                break Disconnect::WriteFailed;
            }
        }
    };

    tracing::info!(reason = %disconnect, "Connection ending");

    // Teardown: heartbeat, pumps, socket
    client.lifecycle.set(LifecycleState::Closing);
    client.heartbeat.disarm();
    client.outbound.lock().take();

    if let (false, Some(code)) = (writer_done, disconnect.close_code()) {
        let _ = outbound.close(code);
        writer_done = tokio::time::timeout(CLOSE_TIMEOUT, &mut writer).await.is_ok();
        if !writer_done {
            tracing::debug!("Close frame not flushed in time");
        }
    }
    drop(outbound);
    if !writer_done {
        writer.abort();
        let _ = writer.await;
    }
    drop(stream);

    ConnectionOutcome {
        disconnect,
        reached_ready,
    }
}
