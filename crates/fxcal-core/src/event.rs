//! Event types for economic calendar entries.
//!
//! This module provides:
//! - [`EventRecord`]: one scraped or persisted calendar entry
//! - [`EventLevel`]: the importance tier of an entry
//! - [`NaturalKey`]: the `(timestamp, title, currency)` identity used for matching
//! - [`EventField`] / [`FieldChange`]: content differences between two records
//!
//! Records carry an `id` that is regenerated on every parse, so it can never be
//! used to recognise the same event across runs. Identity is the natural key.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::currency::Currency;
use crate::error::ModelError;

/// Importance tier of a calendar event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    Low,
    Medium,
    High,
}

impl EventLevel {
    /// Returns the lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for EventLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" | "med" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ModelError::UnknownLevel(s.to_string())),
        }
    }
}

/// The identity of an event for reconciliation purposes.
///
/// Two records with the same natural key describe the same calendar entry,
/// whatever their `id` and content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey<'a> {
    pub timestamp: DateTime<Utc>,
    pub title: &'a str,
    pub currency: Currency,
}

impl fmt::Display for NaturalKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} - {}",
            self.timestamp.format("%d/%m/%y %H:%M:%S %:z"),
            self.currency,
            self.title
        )
    }
}

/// A content field that can change between two scrapes of the same event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventField {
    Level,
    Explanation,
    Forecast,
    Previous,
    Actual,
}

impl EventField {
    /// Returns the field name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Explanation => "explanation",
            Self::Forecast => "forecast",
            Self::Previous => "previous",
            Self::Actual => "actual",
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One differing field between a persisted record and a fresh scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: EventField,
    pub previous: Option<String>,
    pub current: Option<String>,
}

/// One economic calendar entry.
///
/// Records are immutable values: an "update" replaces the stored record at
/// the same natural key with a freshly scraped one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Opaque identifier, fresh on every parse.
    pub id: String,
    /// When the event is released.
    pub timestamp: DateTime<Utc>,
    /// The currency the event relates to.
    pub currency: Currency,
    /// Importance tier.
    pub level: EventLevel,
    /// Event title, e.g. "Non-Farm Payrolls".
    pub title: String,
    /// Released value, once published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Consensus forecast.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<String>,
    /// Value of the previous release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    /// Free-text commentary attached to the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl EventRecord {
    /// Creates a record with the mandatory fields and a fresh random id.
    pub fn new(
        timestamp: DateTime<Utc>,
        currency: Currency,
        level: EventLevel,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            currency,
            level,
            title: title.into(),
            actual: None,
            forecast: None,
            previous: None,
            explanation: None,
        }
    }

    /// Builder method to set the id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Builder method to set the actual value.
    pub fn with_actual(mut self, actual: impl Into<String>) -> Self {
        self.actual = Some(actual.into());
        self
    }

    /// Builder method to set the forecast.
    pub fn with_forecast(mut self, forecast: impl Into<String>) -> Self {
        self.forecast = Some(forecast.into());
        self
    }

    /// Builder method to set the previous value.
    pub fn with_previous(mut self, previous: impl Into<String>) -> Self {
        self.previous = Some(previous.into());
        self
    }

    /// Builder method to set the explanation.
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Returns the natural key of this record.
    pub fn key(&self) -> NaturalKey<'_> {
        NaturalKey {
            timestamp: self.timestamp,
            title: &self.title,
            currency: self.currency,
        }
    }

    /// Returns true if both records share a natural key.
    pub fn same_key(&self, other: &EventRecord) -> bool {
        self.timestamp == other.timestamp
            && self.title == other.title
            && self.currency == other.currency
    }

    /// Orders records by timestamp only.
    ///
    /// This is not an identity: records with equal timestamps compare equal
    /// here whatever their other fields.
    pub fn cmp_by_time(&self, other: &EventRecord) -> Ordering {
        self.timestamp.cmp(&other.timestamp)
    }

    /// Lists the content fields that differ from `previous`.
    ///
    /// Only `level`, `explanation`, `forecast`, `previous` and `actual` are
    /// compared. The `id` and the natural key fields are ignored.
    pub fn changed_fields(&self, previous: &EventRecord) -> Vec<FieldChange> {
        let mut changes = Vec::new();

        if self.level != previous.level {
            changes.push(FieldChange {
                field: EventField::Level,
                previous: Some(previous.level.to_string()),
                current: Some(self.level.to_string()),
            });
        }

        let optionals = [
            (EventField::Explanation, &previous.explanation, &self.explanation),
            (EventField::Forecast, &previous.forecast, &self.forecast),
            (EventField::Previous, &previous.previous, &self.previous),
            (EventField::Actual, &previous.actual, &self.actual),
        ];
        for (field, before, after) in optionals {
            if before != after {
                changes.push(FieldChange {
                    field,
                    previous: before.clone(),
                    current: after.clone(),
                });
            }
        }

        changes
    }

    /// Returns the one-line label used to identify this record in logs.
    pub fn label(&self) -> String {
        self.key().to_string()
    }
}

/// Sorts a batch by timestamp, keeping the page order of simultaneous events.
pub fn sort_by_time(batch: &mut [EventRecord]) {
    batch.sort_by(EventRecord::cmp_by_time);
}
