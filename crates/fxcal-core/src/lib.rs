//! Core types: calendar events, natural keys, time ranges, tracing

use std::future::Future;
use std::pin::Pin;

pub mod currency;
pub mod error;
pub mod event;
pub mod time;
pub mod tracing;

pub use currency::Currency;
pub use error::ModelError;
pub use event::{EventField, EventLevel, EventRecord, FieldChange, NaturalKey, sort_by_time};
pub use time::TimeRange;
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};

/// A boxed future for async trait methods.
///
/// Collaborator traits (page fetchers, stores) return this so they stay
/// object-safe and can be swapped for test doubles behind `Arc<dyn _>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
