//! Sync error types.

use std::time::Duration;

use fxcal_scraper::ScrapeError;
use thiserror::Error;

/// Result type for a pipeline run.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by store clients.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status.
    #[error("store answered {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The call did not finish in time.
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Bad endpoint or client settings.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl StoreError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Errors that abort a whole run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The page could not be fetched.
    #[error("failed to fetch calendar page: {0}")]
    Fetch(#[source] ScrapeError),

    /// The page could not be parsed at all.
    #[error("failed to parse calendar page: {0}")]
    Parse(#[source] ScrapeError),

    /// The page parsed but yielded no event.
    #[error("no event could be extracted from the calendar page")]
    EmptyBatch,

    /// Existing events could not be read from the reference store.
    #[error("failed to query existing events: {0}")]
    ExistingQuery(#[source] StoreError),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if the next scheduled run may succeed unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_retryable(),
            Self::ExistingQuery(StoreError::Config { .. }) => false,
            Self::ExistingQuery(_) => true,
            Self::Parse(_) | Self::EmptyBatch | Self::Config { .. } => false,
        }
    }
}
