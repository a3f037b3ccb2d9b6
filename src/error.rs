//! Meson error abstractions.

use thiserror::Error;

/// The error returned from a dequeue once the owning queue has been closed.
///
/// Closure is terminal: once observed, no further dispatches will ever be produced and any
/// still-pending events have been abandoned. Workers treat this as their shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("push queue closed")]
pub struct QueueClosed;

/// The ways a single config push can fail.
///
/// A failed push is logged and counted by the worker which drove it; it is never fatal, and the
/// proxy is released for re-dispatch either way.
#[derive(Debug, Error)]
pub enum PushError {
    /// The push exceeded the configured push timeout and was abandoned.
    #[error("config push timed out")]
    Timeout,
    /// The transport layer returned an error while delivering the push.
    #[error("error pushing config to proxy: {0}")]
    Transport(#[from] anyhow::Error),
}
