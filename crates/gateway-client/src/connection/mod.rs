//! Connection management
//!
//! Owns the socket and its pumps, drives the handshake state machine and
//! decides between resume and restart when a connection ends.

mod driver;
mod lifecycle;
mod manager;
mod outbound;
mod pump;
mod reconnect;

pub use lifecycle::{Lifecycle, LifecycleState};
pub use manager::GatewayClient;
pub(crate) use manager::ClientInner;
pub use outbound::{OutboundQueue, Outgoing};
pub use reconnect::{classify_close, Backoff, Classification, Disconnect, NORMAL_CLOSURE, RESUMABLE_CLOSURE};
