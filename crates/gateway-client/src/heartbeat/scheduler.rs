//! Heartbeat scheduler
//!
//! One timer task per armed period. After a random initial delay inside the
//! first interval it enqueues a heartbeat carrying the last sequence number,
//! then repeats on a fixed period until disarmed.

use super::AckTracker;
use crate::connection::OutboundQueue;
use crate::protocol::Envelope;
use crate::session::SequenceTracker;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Where heartbeats go and what they carry
#[derive(Debug, Clone)]
pub struct HeartbeatTarget {
    pub outbound: OutboundQueue,
    pub sequence: Arc<SequenceTracker>,
    pub acks: Arc<AckTracker>,
    /// Notified when a beat is due while the previous one is unacknowledged;
    /// `None` disables zombie detection
    pub zombie: Option<Arc<Notify>>,
}

impl HeartbeatTarget {
    /// Enqueue one heartbeat now
    ///
    /// Returns false if the outbound queue is gone.
    pub fn beat(&self) -> bool {
        let sequence = self.sequence.current();
        if self.outbound.send(Envelope::heartbeat(sequence)).is_err() {
            return false;
        }
        self.acks.record_sent();
        tracing::trace!(seq = ?sequence, "Heartbeat enqueued");
        true
    }
}

enum SchedulerState {
    Idle,
    Running {
        interval: Duration,
        task: JoinHandle<()>,
    },
}

/// Heartbeat scheduler
///
/// `Idle -> Running -> Idle`. Arming a running scheduler is a no-op, so a
/// duplicate Hello never starts a second loop.
pub struct HeartbeatScheduler {
    state: Mutex<SchedulerState>,
}

impl HeartbeatScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SchedulerState::Idle),
        }
    }

    /// Start emitting heartbeats every `interval`
    ///
    /// Returns false if the scheduler was already running. Must be called from
    /// within a tokio runtime.
    pub fn arm(&self, interval: Duration, target: HeartbeatTarget) -> bool {
        self.arm_with_jitter(interval, rand::random::<f64>(), target)
    }

    /// Arm with a fixed jitter fraction in `[0, 1)`
    pub(crate) fn arm_with_jitter(
        &self,
        interval: Duration,
        jitter: f64,
        target: HeartbeatTarget,
    ) -> bool {
        let mut state = self.state.lock();
        if let SchedulerState::Running { task, .. } = &*state {
            if !task.is_finished() {
                tracing::debug!("Heartbeat already running, ignoring arm");
                return false;
            }
        }

        let initial_delay = interval.mul_f64(jitter.clamp(0.0, 1.0));
        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            initial_delay_ms = initial_delay.as_millis() as u64,
            "Heartbeat armed"
        );

        let task = tokio::spawn(run(interval, initial_delay, target));
        *state = SchedulerState::Running { interval, task };
        true
    }

    /// Stop emitting heartbeats; safe to call when idle
    pub fn disarm(&self) -> bool {
        let previous = std::mem::replace(&mut *self.state.lock(), SchedulerState::Idle);
        match previous {
            SchedulerState::Running { task, .. } => {
                task.abort();
                tracing::debug!("Heartbeat disarmed");
                true
            }
            SchedulerState::Idle => false,
        }
    }

    /// Whether a heartbeat loop is live
    #[must_use]
    pub fn is_running(&self) -> bool {
        match &*self.state.lock() {
            SchedulerState::Running { task, .. } => !task.is_finished(),
            SchedulerState::Idle => false,
        }
    }

    /// Interval of the live loop
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        match &*self.state.lock() {
            SchedulerState::Running { interval, task } if !task.is_finished() => Some(*interval),
            _ => None,
        }
    }
}

impl Default for HeartbeatScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        if let SchedulerState::Running { task, .. } = self.state.get_mut() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for HeartbeatScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeartbeatScheduler")
            .field("interval", &self.interval())
            .finish()
    }
}

async fn run(interval: Duration, initial_delay: Duration, target: HeartbeatTarget) {
    let mut ticker = tokio::time::interval_at(Instant::now() + initial_delay, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // A beat the server asked for shortly before a tick still has time for its ack
    let grace = interval / 2;

    loop {
        ticker.tick().await;

        if let Some(zombie) = &target.zombie {
            if target.acks.is_overdue(grace) {
                tracing::warn!(
                    interval_ms = interval.as_millis() as u64,
                    "Heartbeat not acknowledged, connection is a zombie"
                );
                zombie.notify_one();
                return;
            }
        }

        if !target.beat() {
            tracing::debug!("Outbound queue closed, heartbeat stopping");
            return;
        }
    }
}
