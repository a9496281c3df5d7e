//! Reconciliation of a scraped batch against persisted records.
//!
//! Records carry no stable identifier, so matching goes through the natural
//! key `(timestamp, title, currency)`. Every scraped record ends up in exactly
//! one of three buckets:
//!
//! - `to_add`: no persisted record has its key
//! - `to_update`: a persisted record has its key but different content
//! - `unchanged`: a persisted record has its key and the same content
//!
//! When several persisted records share a key, the first one in store order is
//! the match.

use std::collections::{HashMap, HashSet};

use fxcal_core::{EventRecord, FieldChange, NaturalKey, TimeRange};
use tracing::{debug, info, warn};

/// A scraped record whose persisted counterpart has different content.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    /// The persisted record matched by natural key.
    pub existing: EventRecord,
    /// The freshly scraped record that replaces it.
    pub scraped: EventRecord,
    /// Fields that differ, in reporting order.
    pub changes: Vec<FieldChange>,
}

/// The outcome of reconciling one scraped batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub to_add: Vec<EventRecord>,
    pub to_update: Vec<PendingUpdate>,
    pub unchanged: Vec<EventRecord>,
    /// Scraped records whose key already appeared earlier in the batch.
    pub duplicate_keys: usize,
}

impl Reconciliation {
    /// Records to persist: new ones first, then the replacements.
    pub fn writes(&self) -> impl Iterator<Item = &EventRecord> {
        self.to_add
            .iter()
            .chain(self.to_update.iter().map(|u| &u.scraped))
    }

    /// Number of records to persist.
    pub fn write_count(&self) -> usize {
        self.to_add.len() + self.to_update.len()
    }

    /// Number of scraped records that matched a persisted one.
    pub fn matched(&self) -> usize {
        self.to_update.len() + self.unchanged.len()
    }

    /// Number of scraped records that were classified.
    pub fn total(&self) -> usize {
        self.to_add.len() + self.matched()
    }

    /// Returns true if nothing needs to be written.
    pub fn is_noop(&self) -> bool {
        self.write_count() == 0
    }
}

/// The inclusive window spanned by a batch, or `None` for an empty batch.
pub fn covering_range(batch: &[EventRecord]) -> Option<TimeRange> {
    TimeRange::covering(batch.iter().map(|e| e.timestamp))
}

/// Splits `scraped` into records to add, to update and to leave alone.
///
/// `existing` should already be restricted to [`covering_range`] of
/// `scraped`. The buckets keep the scraped order.
pub fn reconcile(scraped: Vec<EventRecord>, existing: &[EventRecord]) -> Reconciliation {
    let duplicate_keys = count_duplicate_keys(&scraped);
    if duplicate_keys > 0 {
        warn!(duplicates = duplicate_keys, "Scraped batch holds duplicate event keys");
    }

    if existing.is_empty() {
        info!(new = scraped.len(), "No existing events, all scraped events are new");
        return Reconciliation {
            to_add: scraped,
            duplicate_keys,
            ..Default::default()
        };
    }

    let mut index: HashMap<NaturalKey<'_>, &EventRecord> = HashMap::with_capacity(existing.len());
    for record in existing {
        index.entry(record.key()).or_insert(record);
    }

    let mut result = Reconciliation {
        duplicate_keys,
        ..Default::default()
    };

    for record in scraped {
        let matched = index.get(&record.key()).copied();
        match matched {
            None => {
                debug!(event = %record.label(), "New event");
                result.to_add.push(record);
            }
            Some(current) => {
                let changes = record.changed_fields(current);
                if changes.is_empty() {
                    debug!(event = %record.label(), "Event unchanged");
                    result.unchanged.push(record);
                } else {
                    debug!(
                        event = %record.label(),
                        changed = changes.len(),
                        "Event changed"
                    );
                    result.to_update.push(PendingUpdate {
                        existing: current.clone(),
                        scraped: record,
                        changes,
                    });
                }
            }
        }
    }

    info!(
        existing = existing.len(),
        new = result.to_add.len(),
        updated = result.to_update.len(),
        unchanged = result.unchanged.len(),
        "Reconciled scraped events"
    );
    result
}

fn count_duplicate_keys(batch: &[EventRecord]) -> usize {
    let mut seen = HashSet::with_capacity(batch.len());
    batch.iter().filter(|e| !seen.insert(e.key())).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use fxcal_core::{Currency, EventField, EventLevel};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn nfp() -> EventRecord {
        EventRecord::new(
            at(2024, 1, 10, 8, 30),
            Currency::Usd,
            EventLevel::High,
            "Non-Farm Payrolls",
        )
        .with_forecast("180K")
        .with_previous("175K")
    }

    fn cpi() -> EventRecord {
        EventRecord::new(at(2024, 2, 1, 12, 0), Currency::Eur, EventLevel::Medium, "CPI")
            .with_actual("2.9%")
            .with_forecast("3.0%")
            .with_previous("2.4%")
    }

    fn assert_partition(scraped: &[EventRecord], result: &Reconciliation) {
        let mut ids: Vec<&str> = result
            .to_add
            .iter()
            .chain(result.to_update.iter().map(|u| &u.scraped))
            .chain(result.unchanged.iter())
            .map(|e| e.id.as_str())
            .collect();
        let mut expected: Vec<&str> = scraped.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        expected.sort_unstable();
        assert_eq!(ids, expected);
    }

    mod buckets {
        use super::*;

        #[test]
        fn empty_existing_adds_everything() {
            let scraped = vec![nfp(), cpi()];
            let result = reconcile(scraped.clone(), &[]);
            assert_eq!(result.to_add, scraped);
            assert!(result.to_update.is_empty());
            assert!(result.unchanged.is_empty());
        }

        #[test]
        fn changed_actual_is_an_update() {
            let existing = vec![nfp().with_actual("190K")];
            let scraped = vec![nfp().with_actual("200K")];

            let result = reconcile(scraped, &existing);
            assert!(result.to_add.is_empty());
            assert_eq!(result.to_update.len(), 1);

            let update = &result.to_update[0];
            assert_eq!(update.existing.actual.as_deref(), Some("190K"));
            assert_eq!(update.scraped.actual.as_deref(), Some("200K"));
            assert_eq!(update.changes.len(), 1);
            assert_eq!(update.changes[0].field, EventField::Actual);
        }

        #[test]
        fn identical_record_is_unchanged() {
            let existing = vec![cpi()];
            let result = reconcile(vec![cpi()], &existing);
            assert!(result.to_add.is_empty());
            assert!(result.to_update.is_empty());
            assert_eq!(result.unchanged.len(), 1);
        }

        #[test]
        fn id_difference_alone_is_not_an_update() {
            let existing = vec![cpi().with_id("stored-id")];
            let scraped = vec![cpi().with_id("fresh-id")];
            let result = reconcile(scraped, &existing);
            assert!(result.to_update.is_empty());
            assert_eq!(result.unchanged.len(), 1);
        }

        #[test]
        fn level_change_is_an_update() {
            let mut changed = cpi();
            changed.level = EventLevel::High;
            let result = reconcile(vec![changed], &[cpi()]);
            assert_eq!(result.to_update.len(), 1);
            assert_eq!(result.to_update[0].changes[0].field, EventField::Level);
        }

        #[test]
        fn key_mismatch_on_any_component_is_new() {
            let existing = vec![nfp()];
            let mut other_currency = nfp();
            other_currency.currency = Currency::Cad;
            let mut other_title = nfp();
            other_title.title = "Nonfarm Payrolls".to_string();
            let mut other_time = nfp();
            other_time.timestamp = at(2024, 1, 10, 8, 31);

            let result = reconcile(vec![other_currency, other_title, other_time], &existing);
            assert_eq!(result.to_add.len(), 3);
            assert_eq!(result.matched(), 0);
        }

        #[test]
        fn mixed_batch_is_partitioned() {
            let existing = vec![nfp().with_actual("190K"), cpi()];
            let gdp = EventRecord::new(at(2024, 1, 30, 9, 0), Currency::Gbp, EventLevel::Low, "GDP");
            let scraped = vec![gdp, nfp().with_actual("200K"), cpi()];

            let result = reconcile(scraped.clone(), &existing);
            assert_eq!(result.to_add.len(), 1);
            assert_eq!(result.to_update.len(), 1);
            assert_eq!(result.unchanged.len(), 1);
            assert_eq!(result.total(), scraped.len());
            assert_partition(&scraped, &result);
        }
    }

    mod duplicates {
        use super::*;

        #[test]
        fn first_existing_record_wins() {
            let existing = vec![nfp().with_actual("200K"), nfp().with_actual("150K")];
            let result = reconcile(vec![nfp().with_actual("200K")], &existing);
            assert_eq!(result.unchanged.len(), 1);
            assert!(result.to_update.is_empty());
        }

        #[test]
        fn scraped_duplicates_are_classified_individually() {
            let existing = vec![nfp().with_actual("190K")];
            let scraped = vec![nfp().with_actual("200K"), nfp().with_actual("190K")];

            let result = reconcile(scraped.clone(), &existing);
            assert_eq!(result.duplicate_keys, 1);
            assert_eq!(result.to_update.len(), 1);
            assert_eq!(result.unchanged.len(), 1);
            assert_partition(&scraped, &result);
        }

        #[test]
        fn duplicates_counted_on_fast_path() {
            let scraped = vec![cpi(), cpi(), cpi()];
            let result = reconcile(scraped, &[]);
            assert_eq!(result.duplicate_keys, 2);
            assert_eq!(result.to_add.len(), 3);
        }
    }

    mod helpers {
        use super::*;

        #[test]
        fn writes_lists_additions_then_updates() {
            let existing = vec![nfp().with_actual("190K")];
            let gdp = EventRecord::new(at(2024, 1, 30, 9, 0), Currency::Gbp, EventLevel::Low, "GDP");
            let scraped = vec![nfp().with_actual("200K"), gdp.clone()];

            let result = reconcile(scraped, &existing);
            let titles: Vec<_> = result.writes().map(|e| e.title.as_str()).collect();
            assert_eq!(titles, vec!["GDP", "Non-Farm Payrolls"]);
            assert_eq!(result.write_count(), 2);
            assert!(!result.is_noop());
        }

        #[test]
        fn noop_when_all_unchanged() {
            let result = reconcile(vec![cpi()], &[cpi()]);
            assert!(result.is_noop());
            assert_eq!(result.writes().count(), 0);
        }

        #[test]
        fn covering_range_spans_batch() {
            let batch = vec![cpi(), nfp()];
            let range = covering_range(&batch).unwrap();
            assert_eq!(range.start, at(2024, 1, 10, 8, 30));
            assert_eq!(range.end, at(2024, 2, 1, 12, 0));
            assert!(covering_range(&[]).is_none());
        }
    }
}
