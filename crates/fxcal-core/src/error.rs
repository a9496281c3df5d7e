//! Errors raised while building model values from raw strings.

use thiserror::Error;

/// Errors from the lookup tables and value constructors of the model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The currency marker does not name a known currency.
    #[error("unknown currency: {0:?}")]
    UnknownCurrency(String),

    /// The importance marker does not name a known level.
    #[error("unknown importance level: {0:?}")]
    UnknownLevel(String),

    /// A time range whose start is after its end.
    #[error("invalid time range: start {start} is after end {end}")]
    InvertedRange { start: String, end: String },
}
