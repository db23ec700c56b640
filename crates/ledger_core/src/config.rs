//! Runtime settings for connection sources, transfers and logging.
//!
//! Every struct deserializes with `#[serde(default)]`, so callers can supply
//! only the fields they want to override.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection acquisition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Upper bound on pooled connections (default: 10).
    pub max_pool_size: u32,
    /// How long `acquire` may block on an exhausted pool (default: 30s).
    pub connection_timeout_ms: u64,
    /// SQLite busy handler timeout per connection (default: 5s).
    pub busy_timeout_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            connection_timeout_ms: 30_000,
            busy_timeout_ms: 5_000,
        }
    }
}

impl SourceConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Rejects settings the pool builder would panic on.
    pub fn validate(&self) -> AppResult<()> {
        if self.max_pool_size == 0 {
            return Err(AppError::illegal_state("max_pool_size must be at least 1"));
        }
        if self.connection_timeout_ms == 0 {
            return Err(AppError::illegal_state(
                "connection_timeout_ms must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Business rules applied by the transfer use-case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferPolicy {
    /// Transfers to this member always fail and roll back.
    pub forbidden_member_id: String,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            forbidden_member_id: "ex".to_string(),
        }
    }
}

/// File logging settings consumed by [`crate::logging::init_logging`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// One of `trace|debug|info|warn|error`.
    pub level: String,
    /// Absolute directory receiving rotated log files.
    pub log_dir: String,
    pub max_file_size_bytes: u64,
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            log_dir: String::new(),
            max_file_size_bytes: 10 * 1024 * 1024,
            max_files: 5,
        }
    }
}
