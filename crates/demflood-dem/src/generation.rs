//! Request generations: cooperative, silent cancellation of superseded reads.
//!
//! Every new selection advances a shared counter and receives a
//! [`Generation`] snapshot. Continuations compare their snapshot against the
//! counter before each side effect and abandon their work when a newer
//! selection has started. Nothing is signalled to the transport; only the
//! effects of stale work are suppressed.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// The shared, monotonically increasing request counter.
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    current: Arc<AtomicU64>,
}

impl RequestGeneration {
    /// Create a counter at generation 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, superseding every earlier one.
    pub fn advance(&self) -> Generation {
        let id = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        Generation {
            id,
            counter: Arc::clone(&self.current),
        }
    }

    /// Snapshot of the latest generation without superseding it.
    pub fn snapshot(&self) -> Generation {
        Generation {
            id: self.current(),
            counter: Arc::clone(&self.current),
        }
    }

    /// The latest generation number.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }
}

/// A captured generation, valid until the counter moves past it.
#[derive(Debug, Clone)]
pub struct Generation {
    id: u64,
    counter: Arc<AtomicU64>,
}

impl Generation {
    /// The generation number this snapshot was taken at.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether no newer request has started since this snapshot.
    pub fn is_current(&self) -> bool {
        self.counter.load(Ordering::SeqCst) == self.id
    }

    /// Whether a newer request has superseded this one.
    pub fn is_stale(&self) -> bool {
        !self.is_current()
    }
}
