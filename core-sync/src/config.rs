//! Engine tunables.

use crate::error::{Result, SyncError};
use bridge_traits::MAX_RECORDS_PER_REQUEST;
use core_async::time::Duration;
use core_runtime::config::{CoreConfig, DEFAULT_FLUSH_INTERVAL, DEFAULT_WRITE_BATCH_LIMIT};

/// Settings for [`SyncService`](crate::SyncService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Minimum spacing between throttled flush cycles
    pub flush_interval: Duration,

    /// Maximum records per save/delete call
    pub write_batch_limit: usize,

    /// Start the change watcher when the service is built from `CoreConfig`
    pub auto_flush: bool,

    /// Flush when the app leaves the foreground
    pub flush_on_background: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            write_batch_limit: DEFAULT_WRITE_BATCH_LIMIT,
            auto_flush: true,
            flush_on_background: false,
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval.is_zero() {
            return Err(SyncError::Config(
                "flush_interval must be greater than zero".to_string(),
            ));
        }
        if self.write_batch_limit == 0 || self.write_batch_limit > MAX_RECORDS_PER_REQUEST {
            return Err(SyncError::Config(format!(
                "write_batch_limit must be between 1 and {}, got {}",
                MAX_RECORDS_PER_REQUEST, self.write_batch_limit
            )));
        }
        Ok(())
    }
}

impl From<&CoreConfig> for SyncConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            flush_interval: config.flush_interval,
            write_batch_limit: config.write_batch_limit,
            auto_flush: config.features.enable_auto_flush,
            flush_on_background: config.features.enable_flush_on_background,
        }
    }
}
