//! Relay identity and in-flight tracking.
//!
//! Every dispatched client gets a [`RelayId`] and a [`ConnectionGuard`];
//! the guard keeps the in-flight count (and its gauge) accurate for relays
//! that outlive the accept loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

static NEXT_RELAY_ID: AtomicU64 = AtomicU64::new(1);

/// Sequence number of an accepted client, shown in the relay span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayId(u64);

impl RelayId {
    fn next() -> Self {
        Self(NEXT_RELAY_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RelayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

/// Counts relays that have been dispatched and not yet finished.
///
/// Relays are never joined; the count is the only view the server keeps.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new relay. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::relay_started();
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: RelayId::next(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }
}

/// Held by a relay task for as long as it runs; dropping it (also on
/// unwind) releases the slot.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: RelayId,
}

impl ConnectionGuard {
    pub fn id(&self) -> RelayId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::relay_finished();
        tracing::trace!(relay = %self.id, "Relay released");
    }
}
