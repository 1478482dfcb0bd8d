//! Session tracking
//!
//! State that survives a dropped socket and feeds the Resume request.

mod sequence;
mod state;

pub use sequence::SequenceTracker;
pub use state::{SessionSnapshot, SessionStore};
