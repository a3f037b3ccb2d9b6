//! Pending-push events and their coalescing rules.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::models::MeshSnapshot;

/// A pending config push for a single proxy.
///
/// Events for the same proxy coalesce while they wait to be dispatched, so a proxy receives one
/// push covering everything that changed rather than one push per change.
#[derive(Clone, Debug, PartialEq)]
pub struct PushEvent {
    /// A bool indicating that a full config push is required, subsuming any incremental work.
    pub full: bool,
    /// The set of services for which endpoint data changed.
    ///
    /// Meaningful only when `full` is false; a full push recomputes everything, so the set is
    /// kept empty.
    pub eds_updated_services: HashSet<String>,
    /// The snapshot of mesh state at the time this event was produced.
    pub snapshot: Arc<MeshSnapshot>,
    /// The time at which this event was first observed, used downstream for latency metrics.
    pub start: Instant,
}

impl PushEvent {
    /// Create an event requiring a full config push.
    pub fn full_push(snapshot: Arc<MeshSnapshot>) -> Self {
        Self {
            full: true,
            eds_updated_services: HashSet::new(),
            snapshot,
            start: Instant::now(),
        }
    }

    /// Create an incremental event covering endpoint changes for the given services.
    pub fn incremental(snapshot: Arc<MeshSnapshot>, eds_updated_services: HashSet<String>) -> Self {
        Self {
            full: false,
            eds_updated_services,
            snapshot,
            start: Instant::now(),
        }
    }

    /// Merge this event with a newer event for the same proxy, producing the coalesced event.
    ///
    /// The merged event keeps this event's `start` (so latency is measured from the oldest
    /// queued change), takes the newer event's snapshot (freshest state wins), and unions the
    /// incremental service sets. A full push on either side makes the merged event a full push,
    /// which clears the incremental set.
    ///
    /// This is a pure function: both operands are left untouched and the result is newly
    /// allocated, sharing only the snapshot by reference.
    pub fn merge(&self, newer: &PushEvent) -> PushEvent {
        let full = self.full || newer.full;
        let eds_updated_services = if full {
            HashSet::new()
        } else {
            self.eds_updated_services.union(&newer.eds_updated_services).cloned().collect()
        };
        PushEvent {
            full,
            eds_updated_services,
            snapshot: newer.snapshot.clone(),
            start: self.start,
        }
    }

    /// Merge two optional events, treating an absent side as the identity.
    pub fn merge_opt(older: Option<&PushEvent>, newer: Option<&PushEvent>) -> Option<PushEvent> {
        match (older, newer) {
            (None, newer) => newer.cloned(),
            (older, None) => older.cloned(),
            (Some(older), Some(newer)) => Some(older.merge(newer)),
        }
    }
}
