//! Connection lifecycle state
//!
//! Published through a watch channel so callers can observe transitions
//! instead of catching per-call errors. Every transition is also broadcast,
//! for observers that must not miss short-lived states.

use serde::Serialize;
use tokio::sync::{broadcast, watch};

/// Transitions buffered per broadcast subscriber before it lags
const TRANSITION_BUFFER: usize = 64;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LifecycleState {
    /// No socket
    Disconnected,
    /// Opening the socket
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Identify or Resume sent, waiting for READY or RESUMED
    Handshaking,
    /// Session established
    Ready,
    /// Tearing the connection down
    Closing,
}

impl LifecycleState {
    /// Whether a socket is open in this state
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::AwaitingHello | Self::Handshaking | Self::Ready)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::AwaitingHello => "AwaitingHello",
            Self::Handshaking => "Handshaking",
            Self::Ready => "Ready",
            Self::Closing => "Closing",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Lifecycle state holder
#[derive(Debug)]
pub struct Lifecycle {
    sender: watch::Sender<LifecycleState>,
    transitions: broadcast::Sender<LifecycleState>,
}

impl Lifecycle {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = watch::channel(LifecycleState::Disconnected);
        let (transitions, _) = broadcast::channel(TRANSITION_BUFFER);
        Self { sender, transitions }
    }

    #[must_use]
    pub fn get(&self) -> LifecycleState {
        *self.sender.borrow()
    }

    /// Transition to `state`, returning the previous state
    pub fn set(&self, state: LifecycleState) -> LifecycleState {
        let previous = self.sender.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "Lifecycle transition");
            // No subscribers is fine
            let _ = self.transitions.send(state);
        }
        previous
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.sender.subscribe()
    }

    /// Every transition from now on, in order
    #[must_use]
    pub fn transitions(&self) -> broadcast::Receiver<LifecycleState> {
        self.transitions.subscribe()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
