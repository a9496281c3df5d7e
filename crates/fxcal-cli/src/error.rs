//! Client error types.

use fxcal_core::TracingError;
use fxcal_scraper::ScrapeError;
use fxcal_sync::{RunOutcome, StoreError, SyncError};
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the `fxcal` binary.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Missing or invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Secret reference could not be resolved.
    #[error("secret error: {0}")]
    Secret(#[from] crate::secret::SecretError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Fetching or parsing the page failed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),

    /// A store client could not be built.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The sync run aborted.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// The sync run completed with failed writes.
    #[error("sync finished with outcome {0}")]
    Outcome(RunOutcome),

    /// Output could not be rendered.
    #[error("serialization error: {0}")]
    Serialize(String),

    /// Logging could not be set up.
    #[error(transparent)]
    Tracing(#[from] TracingError),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
