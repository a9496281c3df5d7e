//! Time ranges used to query stores.
//!
//! [`TimeRange`] is the inclusive `[start, end]` window covering a scraped
//! batch. Stores are asked for every event they hold inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// An inclusive window of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (inclusive).
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Creates a new time range.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvertedRange`] if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ModelError> {
        if start > end {
            return Err(ModelError::InvertedRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Creates a range holding a single instant.
    pub fn at(instant: DateTime<Utc>) -> Self {
        Self {
            start: instant,
            end: instant,
        }
    }

    /// Returns the smallest range covering every instant in `instants`,
    /// or `None` if the iterator is empty.
    pub fn covering<I>(instants: I) -> Option<Self>
    where
        I: IntoIterator<Item = DateTime<Utc>>,
    {
        instants.into_iter().fold(None, |range, t| match range {
            None => Some(Self::at(t)),
            Some(r) => Some(Self {
                start: r.start.min(t),
                end: r.end.max(t),
            }),
        })
    }

    /// Returns true if `instant` lies inside the range (bounds included).
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    #[test]
    fn new_rejects_inverted_range() {
        assert!(TimeRange::new(utc(2, 0), utc(1, 0)).is_err());
        assert!(TimeRange::new(utc(1, 0), utc(1, 0)).is_ok());
    }

    #[test]
    fn covering_spans_min_to_max() {
        let range = TimeRange::covering([utc(5, 8), utc(3, 12), utc(9, 1)]).unwrap();
        assert_eq!(range.start, utc(3, 12));
        assert_eq!(range.end, utc(9, 1));
    }

    #[test]
    fn covering_empty_is_none() {
        assert!(TimeRange::covering(Vec::new()).is_none());
    }

    #[test]
    fn contains_is_inclusive() {
        let range = TimeRange::new(utc(1, 0), utc(2, 0)).unwrap();
        assert!(range.contains(utc(1, 0)));
        assert!(range.contains(utc(2, 0)));
        assert!(!range.contains(utc(2, 1)));
    }
}
