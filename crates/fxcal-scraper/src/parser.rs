//! Extraction of event records from the calendar markup.
//!
//! The page lists one `.event` element per calendar row. Each row carries
//! three marker attributes (`data-category`, `data-importance`, `data-id`)
//! and, keyed by the bare row id, a `#date<id>` cell and a `#title<id>` cell
//! inside the row, the title followed by a spacer and the
//! actual/forecast/previous cells. A `#daily<id>` commentary block may sit
//! anywhere in the document.
//!
//! Rows are extracted independently: a malformed row is logged and skipped
//! without affecting the others.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use fxcal_core::{Currency, EventLevel, EventRecord};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info, warn};

use crate::error::{CandidateError, ScrapeError, ScrapeResult};

static EVENT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".event").expect("Invalid event selector"));
static DIV_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div").expect("Invalid div selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("Invalid link selector"));
static COMMENTARY_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".gsstx").expect("Invalid commentary selector"));

static WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));
/// Something that opens or declares a tag: `<div`, `</td`, `<!DOCTYPE`.
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[!/]?[A-Za-z]").expect("Invalid tag regex"));

/// Offset-less layouts; the instant is taken as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Layouts carrying a numeric offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S %:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M %:z",
];

/// Records extracted from one page, plus how many rows were dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Records in page order.
    pub events: Vec<EventRecord>,
    /// Number of `.event` rows that failed extraction.
    pub skipped: usize,
}

impl ParsedPage {
    /// Total number of `.event` rows seen on the page.
    pub fn candidates(&self) -> usize {
        self.events.len() + self.skipped
    }
}

/// Parses the calendar page into event records.
///
/// A page without any `.event` row yields an empty result, not an error.
///
/// # Errors
///
/// Returns an `invalid_markup` error if `source` is blank or contains no tag
/// at all.
pub fn parse_events(source: &str) -> ScrapeResult<ParsedPage> {
    if source.trim().is_empty() {
        return Err(ScrapeError::invalid_markup("page source is empty"));
    }
    if !TAG_REGEX.is_match(source) {
        return Err(ScrapeError::invalid_markup("page source contains no markup"));
    }

    info!("Parsing events from the source");
    let document = Html::parse_document(source);

    let mut page = ParsedPage::default();
    for row in document.select(&EVENT_SELECTOR) {
        match parse_row(&document, row) {
            Ok(event) => {
                debug!(event = %event.label(), "Parsed event");
                page.events.push(event);
            }
            Err(e) => {
                warn!(
                    row_id = row.value().attr("data-id").unwrap_or("?"),
                    error = %e,
                    "Failed to parse event"
                );
                page.skipped += 1;
            }
        }
    }

    info!(
        candidates = page.candidates(),
        parsed = page.events.len(),
        skipped = page.skipped,
        "Parsed {} events",
        page.events.len()
    );
    Ok(page)
}

/// Extracts one record from an `.event` row.
fn parse_row(document: &Html, row: ElementRef<'_>) -> Result<EventRecord, CandidateError> {
    let category = required_attr(row, "data-category")?;
    let importance = required_attr(row, "data-importance")?;
    let row_id = required_attr(row, "data-id")?.replace("ev", "");

    let date_id = format!("date{}", row_id);
    let Some(date_cell) = find_by_id(row, &date_id) else {
        return Err(CandidateError::MissingNode {
            kind: "timestamp",
            node_id: date_id,
        });
    };
    let raw_timestamp = element_text(date_cell, None);
    let timestamp = parse_timestamp(&raw_timestamp)
        .ok_or(CandidateError::InvalidTimestamp(raw_timestamp))?;

    let title_id = format!("title{}", row_id);
    let Some(title_cell) = find_by_id(row, &title_id) else {
        return Err(CandidateError::MissingNode {
            kind: "title",
            node_id: title_id,
        });
    };
    let decoration = title_cell.select(&DIV_SELECTOR).next();
    let title = element_text(title_cell, decoration);
    if title.is_empty() {
        return Err(CandidateError::EmptyTitle);
    }

    // spacer, actual, forecast, previous
    let mut cells = title_cell
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .skip(1);
    let actual = cells.next().and_then(cell_value);
    let forecast = cells.next().and_then(cell_value);
    let previous = cells.next().and_then(cell_value);

    let currency: Currency = category.parse()?;
    let level: EventLevel = importance.parse()?;

    let mut event = EventRecord::new(timestamp, currency, level, title);
    event.actual = actual;
    event.forecast = forecast;
    event.previous = previous;
    event.explanation = commentary(document, &row_id);
    Ok(event)
}

fn required_attr<'a>(
    row: ElementRef<'a>,
    name: &'static str,
) -> Result<&'a str, CandidateError> {
    row.value()
        .attr(name)
        .ok_or(CandidateError::MissingAttribute(name))
}

/// Finds the element under `scope` whose DOM id is `id`.
fn find_by_id<'a>(scope: ElementRef<'a>, id: &str) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// Reads the commentary block for a row, if the page has one.
fn commentary(document: &Html, row_id: &str) -> Option<String> {
    let block = find_by_id(document.root_element(), &format!("daily{}", row_id))?;
    let inner = block.select(&COMMENTARY_SELECTOR).next()?;
    let link = inner.select(&LINK_SELECTOR).next();
    non_empty(element_text(inner, link))
}

/// Reads a value cell; blank cells are absent values.
fn cell_value(cell: ElementRef<'_>) -> Option<String> {
    non_empty(element_text(cell, None))
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Collects the text below `el`, leaving out the subtree rooted at `skip`,
/// with whitespace runs collapsed and the ends trimmed.
fn element_text<'a>(el: ElementRef<'a>, skip: Option<ElementRef<'a>>) -> String {
    let mut raw = String::new();
    collect_text(el, skip, &mut raw);
    WHITESPACE_REGEX.replace_all(raw.trim(), " ").into_owned()
}

fn collect_text<'a>(el: ElementRef<'a>, skip: Option<ElementRef<'a>>, out: &mut String) {
    for child in el.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            if skip == Some(child_el) {
                continue;
            }
            collect_text(child_el, skip, out);
        } else if let Some(text) = child.value().as_text() {
            out.push_str(text);
        }
    }
}

/// Parses a timestamp cell, assuming UTC when the text has no offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    let naive = text.strip_suffix('Z').unwrap_or(text).trim_end();
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .map(|dt| dt.and_utc())
}
