//! Pipeline configuration.

use std::time::Duration;

use url::Url;

/// Settings for one [`SyncPipeline`](crate::SyncPipeline).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Page to scrape.
    pub calendar_url: Url,

    /// Upper bound for a single upsert to a single destination.
    pub write_timeout: Duration,

    /// Records written concurrently. 1 keeps writes and logs in record order.
    pub max_concurrent_writes: usize,

    /// Stop after reconciliation without writing.
    pub dry_run: bool,
}

impl PipelineConfig {
    /// Default write timeout in seconds.
    pub const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

    /// Creates a configuration for the given calendar page.
    pub fn new(calendar_url: Url) -> Self {
        Self {
            calendar_url,
            write_timeout: Duration::from_secs(Self::DEFAULT_WRITE_TIMEOUT_SECS),
            max_concurrent_writes: 1,
            dry_run: false,
        }
    }

    /// Builder: set write timeout.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Builder: set write concurrency (at least 1).
    pub fn with_max_concurrent_writes(mut self, max: usize) -> Self {
        self.max_concurrent_writes = max.max(1);
        self
    }

    /// Builder: set dry run.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}
