//! Gateway envelope format
//!
//! Every message on the gateway socket is one envelope: opcode, optional payload,
//! and for server dispatches an event name and a sequence number.

use super::{HelloPayload, IdentifyPayload, OpCode, ReadyPayload, ResumePayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name of the dispatch that completes a fresh handshake
pub const READY_EVENT: &str = "READY";

/// Event name of the dispatch that completes a resume
pub const RESUMED_EVENT: &str = "RESUMED";

/// Gateway envelope
///
/// Decoding is purely structural: `d` stays an opaque JSON value until one of the
/// typed accessors interprets it for a given opcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Operation code
    pub op: OpCode,

    /// Event data payload
    #[serde(default)]
    pub d: Option<Value>,

    /// Event name (server dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,

    /// Sequence number (server dispatches only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
}

/// Envelope decode failures
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The frame is not a structurally valid envelope
    #[error("malformed envelope: {0}")]
    Malformed(#[source] serde_json::Error),

    /// The envelope is valid but its payload does not match its opcode
    #[error("invalid {op} payload: {source}")]
    Payload {
        op: OpCode,
        #[source]
        source: serde_json::Error,
    },

    /// An accessor was used on an envelope with a different opcode or event
    #[error("expected {expected}, got {actual}")]
    UnexpectedKind { expected: &'static str, actual: String },

    /// Binary frames carry no JSON envelope
    #[error("unsupported binary frame ({0} bytes)")]
    BinaryFrame(usize),
}

impl Envelope {
    // === Client Envelopes ===

    /// Build a client-originated envelope; never carries an event name or sequence
    #[must_use]
    pub fn client(op: OpCode, d: Option<Value>) -> Self {
        Self { op, d, t: None, s: None }
    }

    /// Heartbeat (op=1) carrying the last sequence number seen, or null
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::client(OpCode::Heartbeat, last_sequence.map(Value::from))
    }

    /// Identify (op=2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Ok(Self::client(OpCode::Identify, Some(serde_json::to_value(payload)?)))
    }

    /// Resume (op=6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Ok(Self::client(OpCode::Resume, Some(serde_json::to_value(payload)?)))
    }

    // === Server Envelopes ===

    /// Dispatch (op=0)
    #[must_use]
    pub fn dispatch(event_name: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(data),
            t: Some(event_name.into()),
            s: Some(sequence),
        }
    }

    /// Hello (op=10)
    #[must_use]
    pub fn hello(heartbeat_interval_ms: u64) -> Self {
        Self::client(
            OpCode::Hello,
            Some(serde_json::json!({ "heartbeat_interval": heartbeat_interval_ms })),
        )
    }

    /// Heartbeat ACK (op=11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self::client(OpCode::HeartbeatAck, None)
    }

    /// Reconnect (op=7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self::client(OpCode::Reconnect, None)
    }

    /// Invalid Session (op=9); `resumable` says whether Resume is allowed
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::client(OpCode::InvalidSession, Some(Value::Bool(resumable)))
    }

    // === Codec ===

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode a JSON text frame
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        serde_json::from_str(text).map_err(DecodeError::Malformed)
    }

    // === Accessors ===

    /// Event name, if any
    #[must_use]
    pub fn event_name(&self) -> Option<&str> {
        self.t.as_deref()
    }

    /// Case-insensitive event name comparison
    #[must_use]
    pub fn is_event(&self, name: &str) -> bool {
        self.event_name()
            .is_some_and(|t| t.eq_ignore_ascii_case(name))
    }

    /// Whether this is the dispatch that marks the session ready (READY or RESUMED)
    #[must_use]
    pub fn is_session_ready(&self) -> bool {
        self.is_event(READY_EVENT) || self.is_event(RESUMED_EVENT)
    }

    /// Interpret the payload as `T`
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        let value = self.d.clone().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|source| DecodeError::Payload { op: self.op, source })
    }

    /// Parse the Hello payload (op=10)
    pub fn as_hello(&self) -> Result<HelloPayload, DecodeError> {
        self.expect_op(OpCode::Hello)?;
        self.payload_as()
    }

    /// Parse the READY dispatch payload
    pub fn as_ready(&self) -> Result<ReadyPayload, DecodeError> {
        if self.op != OpCode::Dispatch || !self.is_event(READY_EVENT) {
            return Err(DecodeError::UnexpectedKind {
                expected: "READY dispatch",
                actual: self.to_string(),
            });
        }
        self.payload_as()
    }

    /// Whether an Invalid Session (op=9) permits resuming
    ///
    /// An absent or non-boolean payload is read as `false`.
    pub fn as_invalid_session(&self) -> Result<bool, DecodeError> {
        self.expect_op(OpCode::InvalidSession)?;
        Ok(self.d.as_ref().and_then(Value::as_bool).unwrap_or(false))
    }

    fn expect_op(&self, op: OpCode) -> Result<(), DecodeError> {
        if self.op == op {
            Ok(())
        } else {
            Err(DecodeError::UnexpectedKind {
                expected: op.name(),
                actual: self.op.to_string(),
            })
        }
    }
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "Envelope(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "Envelope(op={})", self.op)
        }
    }
}
