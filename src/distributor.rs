//! The distributor and its pool of push workers.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::StreamExt;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;

use crate::config::Config;
use crate::error::PushError;
use crate::event::PushEvent;
use crate::models::ProxyConnection;
use crate::queue::PushQueue;

const METRIC_PUSHES: &str = "meson_pushes";
const METRIC_PUSH_ERRORS: &str = "meson_push_errors";
const METRIC_PUSH_TIMEOUTS: &str = "meson_push_timeouts";
const METRIC_PUSH_LATENCY: &str = "meson_push_latency_seconds";

/// A type capable of delivering a config push to a connected proxy.
///
/// Implementations live in the transport layer. Returning a `Result::Err` marks the push as
/// failed; the worker logs and counts the failure, releases the proxy, and moves on.
#[async_trait]
pub trait ConfigPusher: Send + Sync + 'static {
    /// Deliver the given coalesced event to the given proxy.
    async fn push(&self, proxy: Arc<ProxyConnection>, event: PushEvent) -> Result<()>;
}

/// The pool of long-lived workers which drive config pushes from the queue out to proxies.
pub struct Distributor {
    /// The application's runtime config.
    config: Arc<Config>,
    /// The queue of pending pushes consumed by this distributor's workers.
    queue: Arc<PushQueue>,
    /// The transport-layer push implementation.
    pusher: Arc<dyn ConfigPusher>,
    /// A channel used for triggering graceful shutdown.
    shutdown_rx: BroadcastStream<()>,
}

impl Distributor {
    /// Create a new instance.
    pub fn new(config: Arc<Config>, queue: Arc<PushQueue>, pusher: Arc<dyn ConfigPusher>, shutdown: broadcast::Receiver<()>) -> Self {
        metrics::register_counter!(METRIC_PUSHES, metrics::Unit::Count, "config pushes delivered to proxies");
        metrics::register_counter!(METRIC_PUSH_ERRORS, metrics::Unit::Count, "config pushes which returned an error");
        metrics::register_counter!(METRIC_PUSH_TIMEOUTS, metrics::Unit::Count, "config pushes abandoned after exceeding the push timeout");
        metrics::register_histogram!(
            METRIC_PUSH_LATENCY,
            metrics::Unit::Seconds,
            "time from first observation of a change event to completion of its push"
        );
        Self {
            config,
            queue,
            pusher,
            shutdown_rx: BroadcastStream::new(shutdown),
        }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) -> Result<()> {
        tracing::info!(workers = self.config.push_workers, "distributor has started");

        let mut workers = Vec::with_capacity(self.config.push_workers);
        for id in 0..self.config.push_workers {
            workers.push(tokio::spawn(Self::push_worker(id, self.queue.clone(), self.pusher.clone(), self.config.push_timeout())));
        }

        let _ = self.shutdown_rx.next().await;

        // Begin shutdown routine. Closing the queue causes every worker to exit its loop.
        self.queue.close();
        for (id, worker) in workers.into_iter().enumerate() {
            if let Err(err) = worker.await {
                tracing::error!(error = ?err, worker = id, "error joining push worker");
            }
        }
        tracing::info!("distributor has shutdown");
        Ok(())
    }

    /// The run loop of a single push worker.
    ///
    /// Each worker loops dequeueing the next ready proxy, delivering its coalesced event
    /// bounded by the configured push timeout, and releasing the proxy. Releasing re-arms the
    /// proxy if further events accumulated during the push. Workers exit once the queue closes.
    async fn push_worker(id: usize, queue: Arc<PushQueue>, pusher: Arc<dyn ConfigPusher>, push_timeout: Duration) {
        loop {
            let (proxy, event) = match queue.dequeue().await {
                Ok(dispatch) => dispatch,
                Err(_closed) => break,
            };
            let start = event.start;
            let outcome = match tokio::time::timeout(push_timeout, pusher.push(proxy.clone(), event)).await {
                Ok(res) => res.map_err(PushError::Transport),
                Err(_elapsed) => Err(PushError::Timeout),
            };
            match outcome {
                Ok(()) => {
                    metrics::increment_counter!(METRIC_PUSHES);
                    metrics::histogram!(METRIC_PUSH_LATENCY, start.elapsed().as_secs_f64());
                }
                Err(PushError::Timeout) => {
                    metrics::increment_counter!(METRIC_PUSH_TIMEOUTS);
                    tracing::error!(proxy = %proxy.con_id, "config push timed out");
                }
                Err(err) => {
                    metrics::increment_counter!(METRIC_PUSH_ERRORS);
                    tracing::error!(error = ?err, proxy = %proxy.con_id, "error pushing config to proxy");
                }
            }
            queue.mark_done(&proxy);
        }
        tracing::debug!(worker = id, "push worker has shutdown");
    }
}
