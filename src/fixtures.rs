use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use crate::event::PushEvent;
use crate::models::{MeshSnapshot, ProxyConnection};
use crate::queue::PushQueue;

/// The deadline used by test probes before declaring that a dequeue would block.
pub const DEQUEUE_DEADLINE: Duration = Duration::from_millis(500);

/// Build a set of distinct proxy connections for use in tests.
pub fn connections(count: usize) -> Vec<Arc<ProxyConnection>> {
    (0..count).map(|offset| ProxyConnection::new(format!("proxy-{}", offset))).collect()
}

/// Build an empty incremental event against a default snapshot.
pub fn noop_event() -> PushEvent {
    PushEvent::incremental(Arc::new(MeshSnapshot::default()), HashSet::new())
}

/// Build a full-push event against a default snapshot.
pub fn full_event() -> PushEvent {
    PushEvent::full_push(Arc::new(MeshSnapshot::default()))
}

/// Build an incremental event for the given services with an explicit start time.
pub fn eds_event<I, S>(services: I, start: Instant) -> PushEvent
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut event = PushEvent::incremental(Arc::new(MeshSnapshot::default()), services.into_iter().map(Into::into).collect());
    event.start = start;
    event
}

/// Dequeue with a deadline, returning `None` if no dispatch was ready in time or the queue
/// was closed.
pub async fn dequeue_with_deadline(queue: &PushQueue) -> Option<(Arc<ProxyConnection>, PushEvent)> {
    match tokio::time::timeout(DEQUEUE_DEADLINE, queue.dequeue()).await {
        Ok(Ok(dispatch)) => Some(dispatch),
        Ok(Err(_closed)) => None,
        Err(_elapsed) => None,
    }
}

/// Dequeue with a deadline, asserting that the returned proxy is identical to `expected`.
pub async fn expect_dequeue(queue: &PushQueue, expected: &Arc<ProxyConnection>) -> Result<PushEvent> {
    let (proxy, event) = match dequeue_with_deadline(queue).await {
        Some(dispatch) => dispatch,
        None => bail!("timed out waiting to dequeue proxy {}", expected.con_id),
    };
    if !Arc::ptr_eq(&proxy, expected) {
        bail!("expected proxy {}, got {}", expected.con_id, proxy.con_id);
    }
    Ok(event)
}

/// Assert that a dequeue does not complete within the deadline.
pub async fn expect_timeout(queue: &PushQueue) -> Result<()> {
    match dequeue_with_deadline(queue).await {
        Some((proxy, _event)) => bail!("expected dequeue to block, got proxy {}", proxy.con_id),
        None => Ok(()),
    }
}
