//! Runtime configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The server's logging config, which uses Rust's `env_logger` directives.
    pub rust_log: String,
    /// The mesh namespace served by this control plane.
    pub namespace: String,

    /// The number of workers used to drive config pushes out to connected proxies.
    #[serde(default = "default_push_workers")]
    pub push_workers: usize,
    /// The maximum number of seconds a single config push may take before it is abandoned.
    #[serde(default = "default_push_timeout_seconds")]
    pub push_timeout_seconds: u64,
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routine just parses the runtime environment and builds the application
    /// config from that. In the future, this may take into account an optional config file as
    /// well.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        Ok(config)
    }

    /// The duration a single config push may take before it is abandoned.
    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_seconds)
    }

    /// Build an instance for use in tests.
    #[cfg(test)]
    pub fn new_test() -> Arc<Self> {
        Arc::new(Self {
            rust_log: "".into(),
            namespace: "default".into(),

            push_workers: 2,
            push_timeout_seconds: 5,
        })
    }
}

fn default_push_workers() -> usize {
    4
}

fn default_push_timeout_seconds() -> u64 {
    30
}
