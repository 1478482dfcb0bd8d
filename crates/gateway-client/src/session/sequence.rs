//! Sequence number tracking

use std::sync::atomic::{AtomicU64, Ordering};

/// Highest sequence number seen in the current session
///
/// The read pump is the only writer; heartbeats and the resume path read it
/// without locking. The stored value is `n + 1` so zero can mean "absent".
#[derive(Debug, Default)]
pub struct SequenceTracker {
    value: AtomicU64,
}

impl SequenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sequence number; smaller or equal values are ignored
    ///
    /// Returns true if the tracked value advanced.
    pub fn observe(&self, sequence: u64) -> bool {
        let encoded = sequence.saturating_add(1);
        self.value.fetch_max(encoded, Ordering::AcqRel) < encoded
    }

    /// Current value, if any sequence was observed since the last reset
    #[must_use]
    pub fn current(&self) -> Option<u64> {
        match self.value.load(Ordering::Acquire) {
            0 => None,
            encoded => Some(encoded - 1),
        }
    }

    /// Forget the tracked value (session abandoned)
    pub fn reset(&self) {
        self.value.store(0, Ordering::Release);
    }
}
