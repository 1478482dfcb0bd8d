//! Session state
//!
//! Session identifier and resume address handed out by the server in READY.

use parking_lot::RwLock;

/// Point-in-time copy of the session state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub resume_url: Option<String>,
}

impl SessionSnapshot {
    /// Whether a session was established and not abandoned since
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.session_id.is_some()
    }
}

/// Shared session state store
#[derive(Debug, Default)]
pub struct SessionStore {
    inner: RwLock<SessionSnapshot>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist the values from a READY payload
    pub fn record(&self, session_id: impl Into<String>, resume_url: impl Into<String>) {
        let mut state = self.inner.write();
        state.session_id = Some(session_id.into());
        state.resume_url = Some(resume_url.into());
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.read().session_id.clone()
    }

    #[must_use]
    pub fn resume_url(&self) -> Option<String> {
        self.inner.read().resume_url.clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.read().clone()
    }

    /// Forget the session (restart path)
    pub fn clear(&self) {
        *self.inner.write() = SessionSnapshot::default();
    }
}
