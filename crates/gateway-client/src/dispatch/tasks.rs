//! Handler task tracking
//!
//! Every handler invocation runs on its own task; the set keeps them joinable so
//! connection teardown can wait for in-flight work instead of abandoning it.

use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};

/// Joinable set of in-flight handler invocations
#[derive(Debug, Default)]
pub struct HandlerTasks {
    set: Mutex<JoinSet<()>>,
}

impl HandlerTasks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a handler invocation
    ///
    /// Must be called from within a tokio runtime. Finished tasks are reaped on
    /// the way so the set does not grow with the number of envelopes received.
    pub fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut set = self.set.lock();
        while let Some(result) = set.try_join_next() {
            log_outcome(result);
        }
        set.spawn(future);
    }

    /// Number of invocations spawned and not yet reaped
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.set.lock().len()
    }

    /// Wait up to `timeout` for in-flight invocations, then abort the rest
    ///
    /// Returns the number of invocations that had to be aborted.
    pub async fn drain(&self, timeout: Duration) -> usize {
        let mut set = std::mem::take(&mut *self.set.lock());
        if set.is_empty() {
            return 0;
        }

        let waited = tokio::time::timeout(timeout, async {
            while let Some(result) = set.join_next().await {
                log_outcome(result);
            }
        })
        .await;

        if waited.is_ok() {
            return 0;
        }

        let aborted = set.len();
        tracing::warn!(aborted, "Handler drain timed out, aborting remaining handlers");
        set.shutdown().await;
        aborted
    }
}

fn log_outcome(result: Result<(), JoinError>) {
    match result {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "Event handler panicked");
        }
        Err(e) => {
            tracing::debug!(error = %e, "Event handler cancelled");
        }
    }
}
