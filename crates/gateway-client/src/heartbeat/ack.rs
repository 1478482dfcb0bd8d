//! Heartbeat acknowledgement tracking

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct AckState {
    awaiting: bool,
    last_sent: Option<Instant>,
    latency: Option<Duration>,
}

/// Tracks whether the last heartbeat was acknowledged and how long it took
#[derive(Debug, Default)]
pub struct AckTracker {
    state: Mutex<AckState>,
}

impl AckTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a heartbeat was enqueued
    pub fn record_sent(&self) {
        let mut state = self.state.lock();
        state.awaiting = true;
        state.last_sent = Some(Instant::now());
    }

    /// Record a heartbeat ACK, returning the round-trip latency if a beat was pending
    pub fn record_ack(&self) -> Option<Duration> {
        let mut state = self.state.lock();
        if !state.awaiting {
            return None;
        }
        state.awaiting = false;
        let latency = state.last_sent.map(|sent| sent.elapsed());
        state.latency = latency;
        latency
    }

    /// Whether the last heartbeat is still unacknowledged
    #[must_use]
    pub fn is_awaiting(&self) -> bool {
        self.state.lock().awaiting
    }

    /// Whether the last heartbeat has gone unacknowledged for at least `grace`
    #[must_use]
    pub fn is_overdue(&self, grace: Duration) -> bool {
        let state = self.state.lock();
        state.awaiting && state.last_sent.is_some_and(|sent| sent.elapsed() >= grace)
    }

    /// Latency of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.state.lock().latency
    }

    /// Forget any pending beat (new connection); the last latency is kept
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.awaiting = false;
        state.last_sent = None;
    }
}
