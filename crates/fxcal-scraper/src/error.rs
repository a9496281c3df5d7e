//! Error types for fetching and parsing the calendar page.
//!
//! [`ScrapeError`] covers failures that abort a whole run (the page could not
//! be fetched, or is not markup at all). [`CandidateError`] covers a single
//! event row that could not be extracted; those are logged and skipped.

use std::fmt;

use fxcal_core::ModelError;
use thiserror::Error;

/// The category of a scrape error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeErrorCode {
    /// Transport failure: connection, TLS, timeout, DNS.
    NetworkError,
    /// The server answered with a status other than 200.
    HttpStatus,
    /// The server answered 200 with an empty body.
    EmptyBody,
    /// The body cannot be treated as markup at all.
    InvalidMarkup,
    /// Bad URL or client settings.
    ConfigurationError,
}

impl ScrapeErrorCode {
    /// Returns true if a later attempt may succeed without any change on our side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError | Self::HttpStatus | Self::EmptyBody)
    }

    /// Returns a machine-friendly name for this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::HttpStatus => "http_status",
            Self::EmptyBody => "empty_body",
            Self::InvalidMarkup => "invalid_markup",
            Self::ConfigurationError => "configuration_error",
        }
    }
}

impl fmt::Display for ScrapeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run-level failure to obtain or read the calendar page.
#[derive(Debug, Error)]
pub struct ScrapeError {
    code: ScrapeErrorCode,
    message: String,
    /// HTTP status, when the server answered.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ScrapeError {
    /// Creates a new error with the given code and message.
    pub fn new(code: ScrapeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ScrapeErrorCode::NetworkError, message)
    }

    /// Creates an error for a non-200 answer.
    pub fn http_status(status: u16) -> Self {
        let mut err = Self::new(
            ScrapeErrorCode::HttpStatus,
            format!("failed to load calendar page (response {})", status),
        );
        err.status = Some(status);
        err
    }

    /// Creates an error for a 200 answer without content.
    pub fn empty_body() -> Self {
        let mut err = Self::new(ScrapeErrorCode::EmptyBody, "calendar page body is empty");
        err.status = Some(200);
        err
    }

    /// Creates an invalid markup error.
    pub fn invalid_markup(message: impl Into<String>) -> Self {
        Self::new(ScrapeErrorCode::InvalidMarkup, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ScrapeErrorCode::ConfigurationError, message)
    }

    /// Sets the source error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ScrapeErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the server answered.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if this error is transient.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl fmt::Display for ScrapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// A specialized Result type for scrape operations.
pub type ScrapeResult<T> = Result<T, ScrapeError>;

/// Why a single event row could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    /// The row lacks one of its marker attributes.
    #[error("missing attribute {0}")]
    MissingAttribute(&'static str),

    /// A node keyed by the row identifier was not found.
    #[error("missing {kind} node #{node_id}")]
    MissingNode { kind: &'static str, node_id: String },

    /// The timestamp text could not be read as an instant.
    #[error("invalid timestamp {0:?}")]
    InvalidTimestamp(String),

    /// The title node holds no text.
    #[error("empty title")]
    EmptyTitle,

    /// Currency or importance marker outside the lookup tables.
    #[error(transparent)]
    Lookup(#[from] ModelError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_retryable() {
        assert!(ScrapeErrorCode::NetworkError.is_retryable());
        assert!(ScrapeErrorCode::HttpStatus.is_retryable());
        assert!(!ScrapeErrorCode::InvalidMarkup.is_retryable());
        assert!(!ScrapeErrorCode::ConfigurationError.is_retryable());
    }

    #[test]
    fn http_status_keeps_status() {
        let err = ScrapeError::http_status(503);
        assert_eq!(err.code(), ScrapeErrorCode::HttpStatus);
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("http_status"));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn with_source_is_exposed() {
        use std::error::Error;
        let io_err = std::io::Error::other("connection reset");
        let err = ScrapeError::network("request failed").with_source(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn candidate_error_display() {
        let err = CandidateError::MissingNode {
            kind: "timestamp",
            node_id: "date42".to_string(),
        };
        assert_eq!(err.to_string(), "missing timestamp node #date42");

        let err = CandidateError::from(ModelError::UnknownCurrency("XAU".to_string()));
        assert_eq!(err.to_string(), "unknown currency: \"XAU\"");
    }
}
