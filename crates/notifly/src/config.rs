//! Service configuration loaded from TOML.
//!
//! ```toml
//! mode = "async"
//! log_events = true
//!
//! [retry]
//! max_attempts = 3
//! initial_delay_ms = 1000
//! max_delay_ms = 10000
//! backoff_multiplier = 2.0
//!
//! [pool]
//! worker_threads = 4
//! shutdown_grace_ms = 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::retry::RetryConfig;

/// How `send_async` executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Everything runs on the caller's thread; no pool.
    Sync,
    /// `send_async` runs on a worker pool.
    #[default]
    Async,
}

/// Worker pool settings for the asynchronous service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Async worker threads driving dispatches
    pub worker_threads: usize,
    /// Upper bound for the on-demand blocking pool
    pub max_blocking_threads: usize,
    /// Idle time after which a blocking thread is reclaimed
    pub keep_alive_ms: u64,
    /// How long shutdown waits for in-flight dispatches
    pub shutdown_grace_ms: u64,
    /// How long shutdown waits after cancelling what is left
    pub force_grace_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_threads: 4,
            max_blocking_threads: 64,
            keep_alive_ms: 60_000,
            shutdown_grace_ms: 5_000,
            force_grace_ms: 2_000,
        }
    }
}

impl PoolConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn force_grace(&self) -> Duration {
        Duration::from_millis(self.force_grace_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "pool.worker_threads must be greater than 0".into(),
            ));
        }
        if self.max_blocking_threads == 0 {
            return Err(ConfigError::Invalid(
                "pool.max_blocking_threads must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration for building a notification service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub mode: ExecutionMode,
    /// Absent means channels call their providers once, without retry
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryConfig>,
    pub pool: PoolConfig,
    /// Attach a listener that logs every lifecycle event
    pub log_events: bool,
}

impl ServiceConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig = toml::from_str(input)?;
        config.pool.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::Io)?;
        Self::from_toml_str(&content)
    }
}
