//! Heartbeat
//!
//! Periodic liveness pings and acknowledgement tracking.

mod ack;
mod scheduler;

pub use ack::AckTracker;
pub use scheduler::{HeartbeatScheduler, HeartbeatTarget};
