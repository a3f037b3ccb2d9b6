//! The Meson config-distribution core.
//!
//! When mesh state changes, the control plane must push updated configuration to every affected
//! data-plane proxy. Change events arrive in bursts, each potentially targeting thousands of
//! proxies, so dispatching every event as-is would swamp the system with redundant pushes. The
//! [`PushQueue`] sits between the mesh-state watchers and the [`Distributor`]'s push workers,
//! coalescing pending events per proxy and dispatching at most one push per proxy at a time.

mod config;
mod distributor;
mod error;
mod event;
#[cfg(test)]
mod fixtures;
mod models;
mod queue;

pub use crate::config::Config;
pub use crate::distributor::{ConfigPusher, Distributor};
pub use crate::error::{PushError, QueueClosed};
pub use crate::event::PushEvent;
pub use crate::models::{MeshSnapshot, ProxyConnection, ProxyPushStatus};
pub use crate::queue::PushQueue;
pub use async_trait::async_trait;
