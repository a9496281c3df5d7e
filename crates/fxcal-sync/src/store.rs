//! Store seams used by the pipeline.
//!
//! [`EventStore`] answers the range query that feeds reconciliation;
//! [`EventSink`] receives upserts. A client that does both (the backend)
//! implements both traits and is handed to the pipeline twice.

use fxcal_core::{BoxFuture, EventRecord, TimeRange};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Acknowledgement of a single write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl WriteAck {
    /// A successful write.
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    /// A rejected write.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }

    /// The message, or a placeholder when the store sent none.
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("no message")
    }
}

/// Source of the records already persisted.
pub trait EventStore: Send + Sync {
    /// Returns every persisted record whose timestamp lies in `range`.
    fn get_in_range<'a>(
        &'a self,
        range: &'a TimeRange,
    ) -> BoxFuture<'a, Result<Vec<EventRecord>, StoreError>>;
}

/// Destination that persists records keyed by their natural key.
pub trait EventSink: Send + Sync {
    /// Short name used in logs and tallies.
    fn name(&self) -> &str;

    /// Inserts the record, or replaces the one with the same natural key.
    fn upsert<'a>(&'a self, record: &'a EventRecord) -> BoxFuture<'a, Result<WriteAck, StoreError>>;
}
