//! Reconciliation and the sync pipeline.
//!
//! This crate decides what to write and writes it:
//! - [`reconcile`] splits a scraped batch into new, changed and unchanged records
//! - [`SyncPipeline`] runs fetch, parse, reconcile and write against injected stores,
//!   once per [`SyncTarget`]
//! - [`BackendStore`] and [`InfluxStore`] are the concrete destinations
//! - [`Trigger`] repeats runs on an interval without overlap
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fxcal_scraper::{FetchConfig, HttpFetcher, calendar_url};
//! use fxcal_sync::{BackendConfig, BackendStore, PipelineConfig, SyncPipeline, SyncTarget};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let url = calendar_url("https://www.dailyfx.com", "/calendar")?;
//!     let fetcher = Arc::new(HttpFetcher::new(&FetchConfig::default())?);
//!     let backend = Arc::new(BackendStore::new(BackendConfig::new(
//!         "https://backend.example.com",
//!         "https://fxcal",
//!         "client",
//!         "key",
//!     ))?);
//!
//!     let pipeline = SyncPipeline::new(PipelineConfig::new(url), fetcher)
//!         .with_target(SyncTarget::new("backend", backend.clone()).with_sink(backend));
//!     let report = pipeline.run().await?;
//!     println!("{}", report.outcome);
//!     Ok(())
//! }
//! ```

mod backend;
mod config;
mod error;
mod influx;
mod pipeline;
mod reconcile;
mod store;
mod trigger;

pub use backend::{APP_URI_HEADER, BackendConfig, BackendStore, events_endpoint};
pub use config::PipelineConfig;
pub use error::{StoreError, SyncError, SyncResult};
pub use influx::{InfluxConfig, InfluxStore, MEASUREMENT, line_protocol};
pub use pipeline::{
    DestinationTally, RunOutcome, RunReport, RunState, SharedRunState, SyncPipeline, SyncTarget,
    TargetReport,
};
pub use reconcile::{PendingUpdate, Reconciliation, covering_range, reconcile};
pub use store::{EventSink, EventStore, WriteAck};
pub use trigger::{
    SharedTriggerState, Trigger, TriggerCommand, TriggerConfig, TriggerHandle, TriggerState,
};
