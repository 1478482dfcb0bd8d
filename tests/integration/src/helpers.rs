//! Test helpers for integration tests
//!
//! A mock gateway server speaking the envelope protocol over a local
//! WebSocket, plus a client harness that runs `GatewayClient` in the background.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use gateway_client::{Envelope, GatewayClient, GatewayResult, LifecycleState, OpCode};
use gateway_common::GatewayConfig;
use serde_json::json;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Upper bound for any single step of a test
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, failing the test if it takes longer than [`STEP_TIMEOUT`]
pub async fn within<F: Future>(future: F) -> Result<F::Output> {
    tokio::time::timeout(STEP_TIMEOUT, future)
        .await
        .map_err(|_| anyhow!("step timed out after {STEP_TIMEOUT:?}"))
}

/// Poll `condition` until it holds, failing after [`STEP_TIMEOUT`]
pub async fn eventually(mut condition: impl FnMut() -> bool) -> Result<()> {
    within(async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
}

/// Collect the next `count` lifecycle transitions
pub async fn next_states(
    events: &mut broadcast::Receiver<LifecycleState>,
    count: usize,
) -> Result<Vec<LifecycleState>> {
    let mut states = Vec::with_capacity(count);
    for _ in 0..count {
        states.push(within(events.recv()).await??);
    }
    Ok(states)
}

/// Mock gateway listening on an ephemeral local port
pub struct MockGateway {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockGateway {
    /// Bind a new mock gateway
    pub async fn start() -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        Ok(Self { listener, addr })
    }

    /// WebSocket URL of the mock
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Accept the next client connection
    pub async fn accept(&self) -> Result<ServerConnection> {
        let (stream, _) = within(self.listener.accept()).await??;
        let ws = within(accept_async(stream)).await??;
        Ok(ServerConnection { ws })
    }
}

/// Server side of one client connection
pub struct ServerConnection {
    ws: WebSocketStream<TcpStream>,
}

impl ServerConnection {
    /// Send an envelope as a text frame
    pub async fn send(&mut self, envelope: &Envelope) -> Result<()> {
        self.send_raw(Message::Text(envelope.to_json()?)).await
    }

    /// Send an arbitrary frame
    pub async fn send_raw(&mut self, message: Message) -> Result<()> {
        within(self.ws.send(message)).await??;
        Ok(())
    }

    pub async fn send_hello(&mut self, heartbeat_interval_ms: u64) -> Result<()> {
        self.send(&Envelope::hello(heartbeat_interval_ms)).await
    }

    /// Send READY; the resume address points back at `resume_url`
    pub async fn send_ready(&mut self, session_id: &str, resume_url: &str, seq: u64) -> Result<()> {
        self.send(&Envelope::dispatch(
            "READY",
            seq,
            json!({
                "v": 10,
                "user": {"id": "1", "username": "bot"},
                "session_id": session_id,
                "resume_gateway_url": resume_url,
            }),
        ))
        .await
    }

    pub async fn send_dispatch(&mut self, event: &str, seq: u64) -> Result<()> {
        self.send(&Envelope::dispatch(event, seq, json!({"seq": seq}))).await
    }

    /// Close the connection with a close code
    pub async fn close(mut self, code: u16) -> Result<()> {
        let frame = CloseFrame {
            code: WsCloseCode::from(code),
            reason: "".into(),
        };
        within(self.ws.close(Some(frame))).await??;
        // Drain until the client's side of the handshake or the socket ends
        let _ = within(async { while self.ws.next().await.is_some() {} }).await;
        Ok(())
    }

    /// Next envelope from the client
    pub async fn recv(&mut self) -> Result<Envelope> {
        loop {
            let frame = within(self.ws.next())
                .await?
                .ok_or_else(|| anyhow!("connection ended"))??;
            match frame {
                Message::Text(text) => return Ok(Envelope::decode(&text)?),
                Message::Close(frame) => bail!("client closed connection: {frame:?}"),
                _ => {}
            }
        }
    }

    /// Next envelope from the client that is not a heartbeat
    pub async fn recv_skip_heartbeats(&mut self) -> Result<Envelope> {
        loop {
            let envelope = self.recv().await?;
            if envelope.op != OpCode::Heartbeat {
                return Ok(envelope);
            }
        }
    }

    /// Next heartbeat from the client, skipping anything else
    pub async fn recv_heartbeat(&mut self) -> Result<Envelope> {
        loop {
            let envelope = self.recv().await?;
            if envelope.op == OpCode::Heartbeat {
                return Ok(envelope);
            }
        }
    }

    /// Wait for the client to close, returning its close code
    pub async fn recv_close(&mut self) -> Result<Option<u16>> {
        loop {
            match within(self.ws.next()).await? {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }

    /// Serve Hello and Identify, then READY with `seq`
    pub async fn handshake(&mut self, session_id: &str, resume_url: &str, seq: u64) -> Result<Envelope> {
        self.send_hello(45_000).await?;
        let identify = self.recv_skip_heartbeats().await?;
        if identify.op != OpCode::Identify {
            bail!("expected Identify, got {identify}");
        }
        self.send_ready(session_id, resume_url, seq).await?;
        Ok(identify)
    }
}

/// Configuration pointed at a mock gateway with short timings
pub fn test_config(gateway_url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::new(crate::fixtures::TEST_TOKEN);
    config.connection.gateway_url = gateway_url.to_string();
    config.connection.hello_timeout_ms = 2_000;
    config.connection.backoff_base_ms = 10;
    config.connection.backoff_max_ms = 50;
    config.connection.handler_drain_timeout_ms = 1_000;
    config
}

/// A client running in the background
pub struct RunningClient {
    pub client: GatewayClient,
    handle: JoinHandle<GatewayResult<()>>,
}

impl RunningClient {
    /// Start `client.run()` on a background task
    pub fn spawn(client: GatewayClient) -> Self {
        let runner = client.clone();
        let handle = tokio::spawn(async move { runner.run().await });
        Self { client, handle }
    }

    /// Wait until the client reaches `state`
    pub async fn wait_for(&self, state: LifecycleState) -> Result<()> {
        let mut receiver = self.client.watch_lifecycle();
        within(receiver.wait_for(|s| *s == state))
            .await?
            .context("lifecycle channel closed")?;
        Ok(())
    }

    /// Wait for `run` to return on its own
    pub async fn join(self) -> Result<GatewayResult<()>> {
        Ok(within(self.handle).await??)
    }

    /// Request shutdown and wait for `run` to return
    pub async fn stop(self) -> Result<GatewayResult<()>> {
        self.client.shutdown();
        self.join().await
    }
}
