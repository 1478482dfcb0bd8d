//! Payload definitions
//!
//! Typed views of the `d` field for the opcodes the session core interprets.

use super::Intents;
use gateway_common::ClientIdentity;
use serde::{Deserialize, Serialize};

/// Payload for op 10 (Hello)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelloPayload {
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: u64,
}

impl HelloPayload {
    #[must_use]
    pub fn with_interval(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }
}

/// Payload for op 2 (Identify)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyPayload {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
}

/// Client connection properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl From<&ClientIdentity> for IdentifyProperties {
    fn from(identity: &ClientIdentity) -> Self {
        Self {
            os: identity.os.clone(),
            browser: identity.browser.clone(),
            device: identity.device.clone(),
        }
    }
}

/// Payload for op 6 (Resume)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumePayload {
    pub token: String,
    /// Session ID to resume
    pub session_id: String,
    /// Last sequence number received
    pub seq: u64,
}

/// READY dispatch payload
///
/// Only the fields the session core consumes; everything else is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyPayload {
    pub session_id: String,
    pub resume_gateway_url: String,
}
