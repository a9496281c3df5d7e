//! Calendar page fetching and event extraction.
//!
//! - [`PageFetcher`] / [`load_page`] - retrieve the raw calendar page
//! - [`parse_events`] - turn page markup into [`EventRecord`](fxcal_core::EventRecord)s
//! - [`ScrapeError`] - run-level failures; [`CandidateError`] - per-row failures
//!
//! ```ignore
//! use fxcal_scraper::{FetchConfig, HttpFetcher, calendar_url, load_page, parse_events};
//!
//! let fetcher = HttpFetcher::new(&FetchConfig::default())?;
//! let url = calendar_url("https://www.dailyfx.com", "/calendar")?;
//! let page = parse_events(&load_page(&fetcher, &url).await?)?;
//! println!("{} events, {} skipped", page.events.len(), page.skipped);
//! ```

pub mod error;
pub mod fetch;
pub mod parser;

pub use error::{CandidateError, ScrapeError, ScrapeErrorCode, ScrapeResult};
pub use fetch::{FetchConfig, FetchedPage, HttpFetcher, PageFetcher, calendar_url, load_page};
pub use parser::{ParsedPage, parse_events, parse_timestamp};
