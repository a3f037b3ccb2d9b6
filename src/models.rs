//! Data models of the config-distribution pipeline.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// An immutable snapshot of mesh state, taken at the time a change event was produced.
///
/// Snapshots are shared by reference and are never merged structurally. When two events for the
/// same proxy coalesce, the newer snapshot simply replaces the older one, as the newer snapshot
/// already reflects everything the older one did.
#[derive(Debug, Default, PartialEq)]
pub struct MeshSnapshot {
    /// The version of mesh state at which this snapshot was taken.
    pub version: String,
    /// Conditions observed while pushing config, keyed by condition type then proxy ID.
    pub proxy_status: HashMap<String, HashMap<String, ProxyPushStatus>>,
}

/// A record of a noteworthy condition observed while generating or pushing config for a proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyPushStatus {
    /// The ID of the proxy on which the condition was observed.
    pub proxy: String,
    /// A human readable description of the condition.
    pub message: String,
}

/// A connected data-plane proxy.
///
/// Connections are compared strictly by reference identity (`Arc::ptr_eq`): two connection
/// objects representing the same remote endpoint are two different proxies, and a reconnecting
/// proxy gets a fresh handle. The connection layer owns these handles and is responsible for
/// draining any queue state for a handle once its connection closes.
#[derive(Debug)]
pub struct ProxyConnection {
    /// The unique ID of this connection.
    pub con_id: String,
    /// The time at which the proxy connected.
    pub connected_at: Instant,
}

impl ProxyConnection {
    /// Create a new connection handle.
    pub fn new(con_id: String) -> Arc<Self> {
        Arc::new(Self {
            con_id,
            connected_at: Instant::now(),
        })
    }
}
