//! Gateway protocol definitions
//!
//! Defines the socket protocol: op codes, the envelope format, close codes and intents.

mod close_codes;
mod envelope;
mod intents;
mod opcodes;
mod payloads;

pub use close_codes::CloseCode;
pub use envelope::{DecodeError, Envelope, READY_EVENT, RESUMED_EVENT};
pub use intents::Intents;
pub use opcodes::OpCode;
pub use payloads::{HelloPayload, IdentifyPayload, IdentifyProperties, ReadyPayload, ResumePayload};
