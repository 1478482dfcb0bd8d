//! Reconnect decision
//!
//! Classifies why a connection ended and paces repeated attempts.

use crate::protocol::CloseCode;
use rand::Rng;
use std::time::Duration;

/// Close code sent when shutting down for good
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code sent when the session must stay resumable server-side
pub const RESUMABLE_CLOSURE: u16 = CloseCode::UnknownError.as_u16();

/// Why a connection ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnect {
    /// Close frame or end of stream; `None` when no code was given
    Closed(Option<u16>),
    /// Read error on the socket
    SocketError(String),
    /// Write pump failed
    WriteFailed,
    /// Server sent Reconnect (op 7)
    ReconnectRequested,
    /// Server sent Invalid Session (op 9)
    InvalidSession { resumable: bool },
    /// A heartbeat went unacknowledged for a whole interval
    Zombie,
    /// Hello was not received in time
    HandshakeTimeout,
    /// Shutdown requested by the caller
    Shutdown,
}

/// Reconnect classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Keep session state and sequence, send Resume after the next Hello
    Resumable,
    /// Abandon the session; a restart sends Identify
    Fatal,
}

/// Classify a close code; the absence of a code is a plain network drop
#[must_use]
pub fn classify_close(code: Option<u16>) -> Classification {
    match code {
        None => Classification::Resumable,
        Some(raw) => match CloseCode::from_u16(raw) {
            Some(code) if code.is_resumable() => Classification::Resumable,
            _ => Classification::Fatal,
        },
    }
}

impl Disconnect {
    #[must_use]
    pub fn classify(&self) -> Classification {
        match self {
            Self::Closed(code) => classify_close(*code),
            Self::SocketError(_) | Self::WriteFailed | Self::ReconnectRequested | Self::Zombie => {
                Classification::Resumable
            }
            Self::InvalidSession { resumable: true } => Classification::Resumable,
            Self::InvalidSession { resumable: false } | Self::HandshakeTimeout | Self::Shutdown => {
                Classification::Fatal
            }
        }
    }

    /// Whether a fresh session may be opened after this disconnect
    ///
    /// False for close codes that reject the credential or configuration.
    #[must_use]
    pub fn allows_restart(&self) -> bool {
        match self {
            Self::Closed(Some(raw)) => CloseCode::from_u16(*raw).map_or(true, CloseCode::allows_restart),
            Self::Shutdown => false,
            _ => true,
        }
    }

    /// Close frame the client sends when it initiates the disconnect
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::ReconnectRequested | Self::Zombie | Self::InvalidSession { resumable: true } => {
                Some(RESUMABLE_CLOSURE)
            }
            Self::InvalidSession { resumable: false } | Self::HandshakeTimeout | Self::Shutdown => {
                Some(NORMAL_CLOSURE)
            }
            Self::Closed(_) | Self::SocketError(_) | Self::WriteFailed => None,
        }
    }

    /// Raw close code received from the server, if any
    #[must_use]
    pub fn received_code(&self) -> Option<u16> {
        match self {
            Self::Closed(code) => *code,
            _ => None,
        }
    }
}

impl std::fmt::Display for Disconnect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed(Some(raw)) => match CloseCode::from_u16(*raw) {
                Some(code) => write!(f, "closed with {code}"),
                None => write!(f, "closed with code {raw}"),
            },
            Self::Closed(None) => write!(f, "closed without code"),
            Self::SocketError(e) => write!(f, "socket error: {e}"),
            Self::WriteFailed => write!(f, "write failed"),
            Self::ReconnectRequested => write!(f, "server requested reconnect"),
            Self::InvalidSession { resumable } => write!(f, "invalid session (resumable: {resumable})"),
            Self::Zombie => write!(f, "heartbeat not acknowledged"),
            Self::HandshakeTimeout => write!(f, "hello timeout"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Exponential backoff with jitter
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    /// Maximum jitter as a fraction of the delay
    const JITTER: f64 = 0.25;

    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Delay before the next attempt, without jitter
    #[must_use]
    pub fn current_delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(31));
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Delay before the next attempt; advances the attempt counter
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay();
        self.attempt = self.attempt.saturating_add(1);
        let jitter = rand::thread_rng().gen_range(0.0..Self::JITTER);
        delay + delay.mul_f64(jitter)
    }

    /// Number of delays handed out since the last reset
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
