//! Gateway client
//!
//! The orchestrator: owns the registry, sequence tracker, session store and
//! heartbeat scheduler, opens one connection at a time and decides after each
//! one whether to resume, restart or stop.

use super::driver::{drive, shutdown_requested};
use super::{Backoff, Classification, Disconnect, Lifecycle, LifecycleState, OutboundQueue};
use crate::dispatch::{EventRegistry, Handler, Interest, RegistrationHandle};
use crate::error::{GatewayError, GatewayResult};
use crate::handlers::HeartbeatHandler;
use crate::heartbeat::{AckTracker, HeartbeatScheduler};
use crate::protocol::{Envelope, OpCode};
use crate::session::{SequenceTracker, SessionSnapshot, SessionStore};
use gateway_common::GatewayConfig;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::connect_async;

/// State shared by the client handle and the connection driver
pub struct ClientInner {
    pub(crate) config: GatewayConfig,
    pub(crate) registry: Arc<EventRegistry>,
    pub(crate) sequence: Arc<SequenceTracker>,
    pub(crate) session: SessionStore,
    pub(crate) heartbeat: HeartbeatScheduler,
    pub(crate) acks: Arc<AckTracker>,
    pub(crate) lifecycle: Lifecycle,
    /// Queue of the live connection, if any
    pub(crate) outbound: Mutex<Option<OutboundQueue>>,
    /// Last READY or RESUMED dispatch, for late `on_ready` callers
    pub(crate) last_ready: Mutex<Option<Arc<Envelope>>>,
    shutdown: watch::Sender<bool>,
    running: AtomicBool,
}

/// Persistent-connection gateway client
///
/// Cheap to clone; clones share the same connection. Call [`GatewayClient::run`]
/// on one clone and [`GatewayClient::shutdown`] from any other.
#[derive(Clone)]
pub struct GatewayClient {
    inner: Arc<ClientInner>,
}

impl GatewayClient {
    /// Create a client with its own dispatch registry
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_registry(config, EventRegistry::new_shared())
    }

    /// Create a client that dispatches through an existing registry
    #[must_use]
    pub fn with_registry(config: GatewayConfig, registry: Arc<EventRegistry>) -> Self {
        let acks = Arc::new(AckTracker::new());
        registry.subscribe(
            Interest::Opcode(OpCode::HeartbeatAck),
            HeartbeatHandler::ack_handler(Arc::clone(&acks)),
        );

        let (shutdown, _) = watch::channel(false);

        Self {
            inner: Arc::new(ClientInner {
                config,
                registry,
                sequence: Arc::new(SequenceTracker::new()),
                session: SessionStore::new(),
                heartbeat: HeartbeatScheduler::new(),
                acks,
                lifecycle: Lifecycle::new(),
                outbound: Mutex::new(None),
                last_ready: Mutex::new(None),
                shutdown,
                running: AtomicBool::new(false),
            }),
        }
    }

    // === Registrations ===

    /// Dispatch registry shared by every connection of this client
    #[must_use]
    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.inner.registry
    }

    /// Register a handler for an interest
    pub fn subscribe<F, Fut>(&self, interest: Interest, handler: F) -> RegistrationHandle
    where
        F: Fn(Arc<Envelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.registry.subscribe(interest, handler)
    }

    /// Handle every dispatch with this event name (case-insensitive)
    pub fn on_event<F, Fut>(&self, name: impl Into<String>, handler: F) -> RegistrationHandle
    where
        F: Fn(Arc<Envelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(Interest::event(name), handler)
    }

    /// Handle every envelope with this opcode
    pub fn on_opcode<F, Fut>(&self, op: OpCode, handler: F) -> RegistrationHandle
    where
        F: Fn(Arc<Envelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(Interest::Opcode(op), handler)
    }

    /// Handle every envelope
    pub fn on_any<F, Fut>(&self, handler: F) -> RegistrationHandle
    where
        F: Fn(Arc<Envelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.subscribe(Interest::Any, handler)
    }

    /// Run `handler` once when the session becomes ready
    ///
    /// If the session is already ready the handler runs right away with the
    /// last READY/RESUMED envelope and no registration is kept (`None`).
    pub fn on_ready<F, Fut>(&self, handler: F) -> Option<RegistrationHandle>
    where
        F: Fn(Arc<Envelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |envelope| Box::pin(handler(envelope)));
        let registry = &self.inner.registry;
        let handle = registry.subscribe_boxed(Interest::ReadyOnce, Arc::clone(&handler));

        if self.lifecycle() == LifecycleState::Ready {
            let last_ready = self.inner.last_ready.lock().clone();
            // A false unsubscribe means the READY dispatch fired it meanwhile
            if let Some(envelope) = last_ready {
                if registry.unsubscribe(handle) {
                    registry.invoke(&handler, envelope);
                    return None;
                }
            }
        }

        Some(handle)
    }

    /// Remove a registration; idempotent
    pub fn unsubscribe(&self, handle: RegistrationHandle) -> bool {
        self.inner.registry.unsubscribe(handle)
    }

    // === State ===

    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.lifecycle.get()
    }

    /// Observe lifecycle transitions
    #[must_use]
    pub fn watch_lifecycle(&self) -> watch::Receiver<LifecycleState> {
        self.inner.lifecycle.subscribe()
    }

    /// Every lifecycle transition, including ones a watcher could miss
    #[must_use]
    pub fn lifecycle_events(&self) -> broadcast::Receiver<LifecycleState> {
        self.inner.lifecycle.transitions()
    }

    #[must_use]
    pub fn session(&self) -> SessionSnapshot {
        self.inner.session.snapshot()
    }

    /// Highest sequence number seen in the current session
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.inner.sequence.current()
    }

    /// Round-trip time of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.inner.acks.latency()
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    // === Connection ===

    /// Enqueue an envelope on the live connection
    ///
    /// Only client op codes are accepted. The event name and sequence number
    /// are stripped, since only server dispatches carry them.
    pub fn send(&self, envelope: Envelope) -> GatewayResult<()> {
        if !envelope.op.is_client_op() {
            return Err(GatewayError::NotClientOp(envelope.op));
        }
        let envelope = Envelope::client(envelope.op, envelope.d);

        let outbound = self.inner.outbound.lock().clone();
        match outbound {
            Some(queue) => queue.send(envelope),
            None => Err(GatewayError::NotConnected),
        }
    }

    /// Ask `run` to close the connection and return
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested");
        self.inner.shutdown.send_replace(true);
    }

    /// Connect and keep the session alive until shutdown or a fatal disconnect
    ///
    /// Resumable disconnects reconnect with Resume, keeping session state.
    /// Fatal ones clear it and restart with Identify when auto-restart is on
    /// and the close code permits it; otherwise `GatewayError::Fatal` is returned.
    pub async fn run(&self) -> GatewayResult<()> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(GatewayError::AlreadyRunning);
        }

        let result = self.run_loop().await;

        let inner = &self.inner;
        inner.heartbeat.disarm();
        let aborted = inner
            .registry
            .drain(inner.config.connection.handler_drain_timeout())
            .await;
        if aborted > 0 {
            tracing::warn!(aborted, "Aborted handlers still running at shutdown");
        }
        inner.lifecycle.set(LifecycleState::Disconnected);
        // Consume the request only now, so one made before `run` is honoured
        inner.shutdown.send_replace(false);
        inner.running.store(false, Ordering::Release);

        tracing::info!("Gateway client stopped");
        result
    }

    async fn run_loop(&self) -> GatewayResult<()> {
        let inner = &self.inner;
        let settings = &inner.config.connection;

        let mut shutdown = inner.shutdown.subscribe();
        let mut backoff = Backoff::new(
            Duration::from_millis(settings.backoff_base_ms),
            Duration::from_millis(settings.backoff_max_ms),
        );

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let url = self.gateway_address();
            inner.lifecycle.set(LifecycleState::Connecting);
            tracing::info!(url = %url, attempt = backoff.attempt(), "Connecting to gateway");

            let connected = tokio::select! {
                result = connect_async(url.as_str()) => result,
                () = shutdown_requested(&mut shutdown) => return Ok(()),
            };

            let socket = match connected {
                Ok((socket, _response)) => socket,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Failed to connect to gateway");
                    inner.lifecycle.set(LifecycleState::Disconnected);
                    if !settings.auto_restart {
                        return Err(GatewayError::WebSocket(e));
                    }
                    if self.pause(backoff.next_delay(), &mut shutdown).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            let outcome = drive(inner, socket, &mut shutdown).await;
            let disconnect = outcome.disconnect;

            if disconnect == Disconnect::Shutdown {
                return Ok(());
            }
            if outcome.reached_ready {
                backoff.reset();
            }

            match disconnect.classify() {
                Classification::Resumable => {
                    tracing::info!(
                        reason = %disconnect,
                        session_id = ?inner.session.session_id(),
                        seq = ?inner.sequence.current(),
                        "Connection lost, resuming"
                    );
                    if !outcome.reached_ready && self.pause(backoff.next_delay(), &mut shutdown).await {
                        return Ok(());
                    }
                }
                Classification::Fatal => {
                    self.abandon_session();
                    inner.lifecycle.set(LifecycleState::Disconnected);

                    if !settings.auto_restart || !disconnect.allows_restart() {
                        tracing::error!(
                            reason = %disconnect,
                            close_code = ?disconnect.received_code(),
                            "Fatal disconnect, not restarting"
                        );
                        return Err(GatewayError::Fatal {
                            code: disconnect.received_code(),
                            reason: disconnect.to_string(),
                        });
                    }

                    tracing::warn!(reason = %disconnect, "Session abandoned, restarting");
                    if self.pause(backoff.next_delay(), &mut shutdown).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Forget session state and sequence (restart path)
    fn abandon_session(&self) {
        self.inner.session.clear();
        self.inner.sequence.reset();
        self.inner.last_ready.lock().take();
    }

    /// Sleep before the next attempt; true if shutdown was requested meanwhile
    async fn pause(&self, delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Waiting before reconnect");
        tokio::select! {
            () = tokio::time::sleep(delay) => false,
            () = shutdown_requested(shutdown) => true,
        }
    }

    /// Resume address from the last READY, or the configured gateway address
    fn gateway_address(&self) -> String {
        let default_url = &self.inner.config.connection.gateway_url;
        match self.inner.session.resume_url() {
            Some(resume_url) => with_default_query(&resume_url, default_url),
            None => default_url.clone(),
        }
    }
}

/// Carry the version/encoding query of the default address over to a bare resume address
fn with_default_query(resume_url: &str, default_url: &str) -> String {
    if resume_url.contains('?') {
        return resume_url.to_string();
    }
    match default_url.split_once('?') {
        Some((_, query)) => format!("{}/?{}", resume_url.trim_end_matches('/'), query),
        None => resume_url.to_string(),
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("lifecycle", &self.lifecycle())
            .field("session", &self.session())
            .field("sequence", &self.sequence())
            .field("registry", &self.inner.registry)
            .finish()
    }
}
