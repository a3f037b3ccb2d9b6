//! The config-distribution push queue.
//!
//! The queue sits between the mesh-state watchers (producers) and the distributor's push
//! workers (consumers). It holds at most one coalesced event per proxy, dispatches proxies in
//! the order they first became ready, and never dispatches a proxy which still has a push in
//! flight. Repeated enqueues for a proxy which is already ready merge into its pending event
//! without moving it in the dispatch order, so a burst of updates targeting one proxy can never
//! starve the others.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::error::QueueClosed;
use crate::event::PushEvent;
use crate::models::ProxyConnection;

const METRIC_QUEUE_DEPTH: &str = "meson_push_queue_depth";
const METRIC_QUEUE_MERGES: &str = "meson_push_queue_merges";

/// A blocking multi-producer multi-consumer queue of pending config pushes, one slot per proxy.
pub struct PushQueue {
    /// Queue state, guarded by a single mutex.
    ///
    /// Critical sections are O(1) amortised and the lock is never held across an await point.
    state: Mutex<QueueState>,
    /// The signal used to wake consumers blocked in `dequeue`.
    notify: Notify,
}

/// The mutable interior of a [`PushQueue`].
#[derive(Default)]
struct QueueState {
    /// Pending events awaiting dispatch, at most one per proxy, keyed by connection identity.
    pending: HashMap<usize, (Arc<ProxyConnection>, PushEvent)>,
    /// FIFO of proxies ready for dispatch. Presence implies membership in `pending`.
    order: VecDeque<usize>,
    /// Proxies with a push currently in flight, along with any event which has accumulated
    /// against them since dispatch.
    ///
    /// The handle is retained here so its identity key stays live for the whole push, whether
    /// or not the consumer holds its own clone.
    inflight: HashMap<usize, (Arc<ProxyConnection>, Option<PushEvent>)>,
    /// A bool indicating that the queue has been closed.
    closed: bool,
}

/// The identity key of a connection handle.
///
/// Connections are compared strictly by reference identity, never by contents, so the key is
/// the `Arc`'s pointer value.
fn identity(proxy: &Arc<ProxyConnection>) -> usize {
    Arc::as_ptr(proxy) as usize
}

impl PushQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        metrics::register_gauge!(METRIC_QUEUE_DEPTH, metrics::Unit::Count, "the number of proxies ready for config push dispatch");
        metrics::register_counter!(METRIC_QUEUE_MERGES, metrics::Unit::Count, "push events coalesced into an already pending event");
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Enqueue a push event for the given proxy. Never blocks.
    ///
    /// If the proxy already has a pending event the two are merged in place without changing
    /// the proxy's position in the dispatch order. If the proxy currently has a push in flight,
    /// the event accumulates against it and is re-emitted once the push is marked done.
    pub fn enqueue(&self, proxy: &Arc<ProxyConnection>, event: PushEvent) {
        let mut state = self.state.lock();
        if state.closed {
            tracing::trace!(proxy = %proxy.con_id, "push event dropped, queue is closed");
            return;
        }
        let key = identity(proxy);

        // An in-flight proxy must not be dispatched again until `mark_done`, so its newly
        // arriving events accumulate against it instead of re-entering the dispatch order.
        if let Some((_, slot)) = state.inflight.get_mut(&key) {
            *slot = Some(match slot.take() {
                Some(accumulated) => {
                    metrics::increment_counter!(METRIC_QUEUE_MERGES);
                    accumulated.merge(&event)
                }
                None => event,
            });
            return;
        }

        if let Some((_, pending)) = state.pending.get_mut(&key) {
            metrics::increment_counter!(METRIC_QUEUE_MERGES);
            *pending = pending.merge(&event);
            return;
        }

        state.pending.insert(key, (proxy.clone(), event));
        state.order.push_back(key);
        metrics::gauge!(METRIC_QUEUE_DEPTH, state.order.len() as f64);
        drop(state);
        self.notify.notify_one();
    }

    /// Dequeue the next ready proxy along with its coalesced event, waiting until one is
    /// available.
    ///
    /// Returns `Err(QueueClosed)` once the queue has been closed. Dropping the returned future
    /// before it completes leaves the queue untouched, so callers may freely race `dequeue`
    /// against a deadline.
    pub async fn dequeue(&self) -> Result<(Arc<ProxyConnection>, PushEvent), QueueClosed> {
        loop {
            // Register for a wake-up before checking state, so a signal landing between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(QueueClosed);
                }
                while let Some(key) = state.order.pop_front() {
                    metrics::gauge!(METRIC_QUEUE_DEPTH, state.order.len() as f64);
                    let (proxy, event) = match state.pending.remove(&key) {
                        Some(entry) => entry,
                        None => {
                            tracing::error!("invariant violation: ready proxy has no pending event");
                            continue;
                        }
                    };
                    state.inflight.insert(key, (proxy.clone(), None));
                    return Ok((proxy, event));
                }
            }
            notified.await;
        }
    }

    /// Release the given proxy, making it eligible for dispatch again. Never blocks.
    ///
    /// If events accumulated while the proxy was in flight, the proxy re-enters the dispatch
    /// order at the tail with the accumulated event as its pending event.
    pub fn mark_done(&self, proxy: &Arc<ProxyConnection>) {
        let mut state = self.state.lock();
        let key = identity(proxy);
        let (handle, accumulated) = match state.inflight.remove(&key) {
            Some(entry) => entry,
            // The proxy was never dequeued; treat the call as a no-op rather than risk
            // corrupting queue state.
            None => return,
        };
        if let Some(event) = accumulated {
            state.pending.insert(key, (handle, event));
            state.order.push_back(key);
            metrics::gauge!(METRIC_QUEUE_DEPTH, state.order.len() as f64);
            drop(state);
            self.notify.notify_one();
        }
    }

    /// Close the queue, waking all blocked consumers. Terminal.
    ///
    /// Subsequent enqueues are dropped, and all current and future `dequeue` calls return
    /// `Err(QueueClosed)` immediately, abandoning any still-pending events.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        drop(state);
        self.notify.notify_waiters();
    }

    /// The number of proxies with an undispatched event, whether ready or accumulated against
    /// an in-flight push.
    pub fn pending(&self) -> usize {
        let state = self.state.lock();
        state.pending.len() + state.inflight.values().filter(|(_, slot)| slot.is_some()).count()
    }
}

impl Default for PushQueue {
    fn default() -> Self {
        Self::new()
    }
}
