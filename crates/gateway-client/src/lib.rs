//! # gateway-client
//!
//! Persistent-connection client for a sequenced real-time gateway.
//!
//! A [`GatewayClient`] owns one dispatch registry, one sequence tracker, one
//! session store and one heartbeat scheduler, and drives a single live socket
//! at a time through the handshake, steady state and resume/restart cycle.

pub mod connection;
pub mod dispatch;
pub mod error;
mod handlers;
pub mod heartbeat;
pub mod protocol;
pub mod rest;
pub mod session;

pub use connection::{GatewayClient, LifecycleState};
pub use dispatch::{EventRegistry, Interest, RegistrationHandle};
pub use error::{GatewayError, GatewayResult};
pub use protocol::{CloseCode, DecodeError, Envelope, Intents, OpCode};
pub use rest::{HttpRestClient, Method, RestError, RestTransport};
pub use session::SessionSnapshot;
