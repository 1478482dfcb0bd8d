//! Event registry
//!
//! Thread-safe collection of interest registrations. Dispatch snapshots the
//! matching handlers under the read lock and runs each one on its own task, so
//! the read pump never waits for user code.

use super::HandlerTasks;
use crate::protocol::{Envelope, OpCode};
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Boxed event handler
pub type Handler = Arc<dyn Fn(Arc<Envelope>) -> BoxFuture<'static, ()> + Send + Sync>;

/// What a registration wants to receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interest {
    /// Every envelope with this opcode
    Opcode(OpCode),
    /// Every envelope with this event name (case-insensitive)
    Event(String),
    /// Every envelope
    Any,
    /// The next session-ready dispatch (READY or RESUMED), once
    ReadyOnce,
}

impl Interest {
    #[must_use]
    pub fn event(name: impl Into<String>) -> Self {
        Self::Event(name.into())
    }

    /// Check whether an envelope matches this interest
    #[must_use]
    pub fn matches(&self, envelope: &Envelope) -> bool {
        match self {
            Self::Opcode(op) => envelope.op == *op,
            Self::Event(name) => envelope.is_event(name),
            Self::Any => true,
            Self::ReadyOnce => envelope.is_session_ready(),
        }
    }
}

impl std::fmt::Display for Interest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Opcode(op) => write!(f, "opcode {op}"),
            Self::Event(name) => write!(f, "event {name}"),
            Self::Any => write!(f, "any"),
            Self::ReadyOnce => write!(f, "ready-once"),
        }
    }
}

/// Opaque handle returned by [`EventRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationHandle(u64);

impl RegistrationHandle {
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

struct Registration {
    interest: Interest,
    handler: Handler,
    /// Cleared on unsubscribe; checked again when the invocation task starts
    live: AtomicBool,
    /// Set by the single ReadyOnce firing
    fired: AtomicBool,
}

/// Registry of event interests
pub struct EventRegistry {
    registrations: RwLock<BTreeMap<u64, Arc<Registration>>>,
    next_id: AtomicU64,
    tasks: HandlerTasks,
}

impl EventRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registrations: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            tasks: HandlerTasks::new(),
        }
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a handler for an interest
    pub fn subscribe<F, Fut>(&self, interest: Interest, handler: F) -> RegistrationHandle
    where
        F: Fn(Arc<Envelope>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |envelope| Box::pin(handler(envelope)));
        self.subscribe_boxed(interest, handler)
    }

    /// Register an already boxed handler
    pub fn subscribe_boxed(&self, interest: Interest, handler: Handler) -> RegistrationHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(registration = id, interest = %interest, "Handler registered");

        let registration = Arc::new(Registration {
            interest,
            handler,
            live: AtomicBool::new(true),
            fired: AtomicBool::new(false),
        });
        self.registrations.write().insert(id, registration);

        RegistrationHandle(id)
    }

    /// Remove a registration
    ///
    /// Idempotent: returns false for unknown or already removed handles.
    pub fn unsubscribe(&self, handle: RegistrationHandle) -> bool {
        let removed = self.registrations.write().remove(&handle.0);
        match removed {
            Some(registration) => {
                registration.live.store(false, Ordering::Release);
                tracing::debug!(registration = handle.0, "Handler unregistered");
                true
            }
            None => false,
        }
    }

    /// Number of live registrations
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fan an envelope out to every matching registration
    ///
    /// Each handler runs on its own task; this call never waits for them.
    /// Returns the number of invocations scheduled. Must be called from within
    /// a tokio runtime.
    pub fn dispatch(&self, envelope: Arc<Envelope>) -> usize {
        let mut matched = Vec::new();
        let mut spent = Vec::new();

        {
            let registrations = self.registrations.read();
            for (id, registration) in &*registrations {
                if !registration.interest.matches(&envelope) {
                    continue;
                }
                if registration.interest == Interest::ReadyOnce {
                    if registration.fired.swap(true, Ordering::AcqRel) {
                        continue;
                    }
                    spent.push(*id);
                }
                matched.push(Arc::clone(registration));
            }
        }

        if !spent.is_empty() {
            let mut registrations = self.registrations.write();
            for id in &spent {
                if let Some(registration) = registrations.remove(id) {
                    registration.live.store(false, Ordering::Release);
                }
            }
        }

        let scheduled = matched.len();
        for registration in matched {
            let envelope = Arc::clone(&envelope);
            let once = registration.interest == Interest::ReadyOnce;
            self.tasks.spawn(async move {
                // A ReadyOnce registration is removed by the firing itself
                if once || registration.live.load(Ordering::Acquire) {
                    (registration.handler)(envelope).await;
                }
            });
        }

        scheduled
    }

    /// Run a handler outside any registration, tracked like a dispatched one
    pub fn invoke(&self, handler: &Handler, envelope: Arc<Envelope>) {
        self.tasks.spawn(handler(envelope));
    }

    /// Number of handler invocations not yet reaped
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tasks.in_flight()
    }

    /// Wait for in-flight handler invocations, aborting what is left after `timeout`
    pub async fn drain(&self, timeout: Duration) -> usize {
        self.tasks.drain(timeout).await
    }
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("registrations", &self.len())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
