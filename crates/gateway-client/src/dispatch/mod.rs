//! Event dispatch
//!
//! Interest registrations and the concurrent fan-out of inbound envelopes.

mod registry;
mod tasks;

pub use registry::{EventRegistry, Handler, Interest, RegistrationHandle};
pub use tasks::HandlerTasks;
