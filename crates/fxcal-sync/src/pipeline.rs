//! The sync run: fetch, parse, reconcile, write.
//!
//! [`SyncPipeline`] owns its collaborators as trait objects. The page is
//! fetched and parsed once per run, then every [`SyncTarget`] is reconciled
//! against its own reference store and its plan written to its own sinks.
//! One run walks through [`RunState`]s, observable through
//! [`SyncPipeline::state`]:
//!
//! ```text
//! Idle -> Fetching -> Parsing -> Reconciling -> Writing -> Done(outcome)
//! ```
//!
//! Fetch, total parse and empty batch failures abort the run before anything
//! is written, and so does a range query failure on every target. A target
//! whose range query fails while others succeed is skipped and counted as a
//! failure. Write failures are counted per destination and never stop the
//! remaining writes.

use std::fmt;
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::{self, StreamExt};
use fxcal_core::{EventRecord, TimeRange, sort_by_time};
use fxcal_scraper::{PageFetcher, ParsedPage, load_page, parse_events};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{StoreError, SyncError, SyncResult};
use crate::reconcile::{Reconciliation, covering_range, reconcile};
use crate::store::{EventSink, EventStore};

/// Final verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every write succeeded, or there was nothing to write.
    Success,
    /// Some writes failed, some succeeded.
    Partial,
    /// The run aborted, or every write failed.
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    /// Derives the outcome from success and failure counts.
    pub fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failed,
            _ => Self::Partial,
        }
    }

    /// Derives the outcome of a run; a skipped target counts as one failure.
    pub fn from_targets(targets: &[TargetReport]) -> Self {
        let succeeded: usize = targets.iter().map(TargetReport::succeeded).sum();
        let failed: usize = targets
            .iter()
            .map(|t| t.failed() + usize::from(t.is_skipped()))
            .sum();
        Self::from_counts(succeeded, failed)
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunState {
    #[default]
    Idle,
    Fetching,
    Parsing,
    Reconciling,
    Writing,
    Done(RunOutcome),
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Fetching => f.write_str("fetching"),
            Self::Parsing => f.write_str("parsing"),
            Self::Reconciling => f.write_str("reconciling"),
            Self::Writing => f.write_str("writing"),
            Self::Done(outcome) => write!(f, "done ({})", outcome),
        }
    }
}

/// Shared handle on the run state.
pub type SharedRunState = Arc<RwLock<RunState>>;

/// One backend environment: the store the plan is computed against, and
/// the sinks that receive it.
pub struct SyncTarget {
    name: String,
    reference: Arc<dyn EventStore>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl SyncTarget {
    /// Creates a target reconciled against `reference`, with no sink yet.
    pub fn new(name: impl Into<String>, reference: Arc<dyn EventStore>) -> Self {
        Self {
            name: name.into(),
            reference,
            sinks: Vec::new(),
        }
    }

    /// Attaches a write destination.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the attached destinations, in attachment order.
    pub fn sink_names(&self) -> Vec<&str> {
        self.sinks.iter().map(|s| s.name()).collect()
    }
}

/// Write counts for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTally {
    pub name: String,
    pub succeeded: usize,
    pub failed: usize,
}

impl DestinationTally {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            succeeded: 0,
            failed: 0,
        }
    }
}

/// What one run did for one target.
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub name: String,
    /// Records returned by the range query.
    pub existing: usize,
    /// The reconciliation that drove the writes.
    pub plan: Reconciliation,
    /// One entry per sink; empty on a dry run or for a skipped target.
    pub destinations: Vec<DestinationTally>,
    /// Set when the range query failed and the target was skipped.
    pub error: Option<String>,
}

impl TargetReport {
    fn planned(name: &str, existing: usize, plan: Reconciliation) -> Self {
        Self {
            name: name.to_string(),
            existing,
            plan,
            destinations: Vec::new(),
            error: None,
        }
    }

    fn unreachable(name: &str, error: &StoreError) -> Self {
        Self {
            name: name.to_string(),
            existing: 0,
            plan: Reconciliation::default(),
            destinations: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.error.is_some()
    }

    pub fn succeeded(&self) -> usize {
        self.destinations.iter().map(|t| t.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.destinations.iter().map(|t| t.failed).sum()
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Records extracted from the page.
    pub parsed: usize,
    /// Event rows dropped by the parser.
    pub skipped: usize,
    /// One entry per target, in attachment order.
    pub targets: Vec<TargetReport>,
    pub dry_run: bool,
}

impl RunReport {
    /// Total successful writes across targets and destinations.
    pub fn succeeded(&self) -> usize {
        self.targets.iter().map(TargetReport::succeeded).sum()
    }

    /// Total failed writes across targets and destinations.
    pub fn failed(&self) -> usize {
        self.targets.iter().map(TargetReport::failed).sum()
    }

    /// Looks a target up by name.
    pub fn target(&self, name: &str) -> Option<&TargetReport> {
        self.targets.iter().find(|t| t.name == name)
    }
}

/// Scrapes the calendar and brings every target up to date.
pub struct SyncPipeline {
    config: PipelineConfig,
    fetcher: Arc<dyn PageFetcher>,
    targets: Vec<SyncTarget>,
    state: SharedRunState,
}

impl SyncPipeline {
    /// Creates a pipeline with no target; see [`with_target`](Self::with_target).
    pub fn new(config: PipelineConfig, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            config,
            fetcher,
            targets: Vec::new(),
            state: Arc::new(RwLock::new(RunState::Idle)),
        }
    }

    /// Attaches a target, reconciled independently of the others.
    pub fn with_target(mut self, target: SyncTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Returns the shared run state.
    pub fn state(&self) -> SharedRunState {
        self.state.clone()
    }

    pub fn targets(&self) -> &[SyncTarget] {
        &self.targets
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Performs one run.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncError`] when the run aborts before the write phase.
    /// Write failures and skipped targets are reported through the
    /// [`RunReport`] instead.
    pub async fn run(&self) -> SyncResult<RunReport> {
        let result = self.execute().await;
        match result {
            Ok(ref report) => {
                self.transition(RunState::Done(report.outcome)).await;
                info!(
                    outcome = %report.outcome,
                    parsed = report.parsed,
                    skipped = report.skipped,
                    targets = report.targets.len(),
                    succeeded = report.succeeded(),
                    failed = report.failed(),
                    "Sync run finished"
                );
            }
            Err(ref e) => {
                self.transition(RunState::Done(RunOutcome::Failed)).await;
                error!(error = %e, transient = e.is_transient(), "Sync run aborted");
            }
        }
        result
    }

    async fn transition(&self, next: RunState) {
        let mut state = self.state.write().await;
        let previous = *state;
        debug!(from = %previous, to = %next, "Run state changed");
        *state = next;
    }

    async fn execute(&self) -> SyncResult<RunReport> {
        if self.targets.is_empty() {
            return Err(SyncError::config("no sync target configured"));
        }

        self.transition(RunState::Fetching).await;
        let body = load_page(self.fetcher.as_ref(), &self.config.calendar_url)
            .await
            .map_err(SyncError::Fetch)?;

        self.transition(RunState::Parsing).await;
        let ParsedPage { mut events, skipped } = parse_events(&body).map_err(SyncError::Parse)?;
        if events.is_empty() {
            error!(skipped, "No event could be extracted from the page");
            return Err(SyncError::EmptyBatch);
        }
        let parsed = events.len();
        sort_by_time(&mut events);

        self.transition(RunState::Reconciling).await;
        let range = covering_range(&events).ok_or(SyncError::EmptyBatch)?;
        let mut reports = self.plan_targets(&events, &range).await?;

        if self.config.dry_run {
            for report in &reports {
                info!(
                    sync_target = %report.name,
                    writes = report.plan.write_count(),
                    "Dry run, no event written"
                );
            }
            return Ok(RunReport {
                outcome: RunOutcome::from_targets(&reports),
                parsed,
                skipped,
                targets: reports,
                dry_run: true,
            });
        }

        self.transition(RunState::Writing).await;
        for (target, report) in self.targets.iter().zip(reports.iter_mut()) {
            if !report.is_skipped() {
                report.destinations = self.write_target(target, &report.plan).await;
            }
        }

        Ok(RunReport {
            outcome: RunOutcome::from_targets(&reports),
            parsed,
            skipped,
            targets: reports,
            dry_run: false,
        })
    }

    /// Queries and reconciles every target.
    ///
    /// Fails only when no target could be queried.
    async fn plan_targets(
        &self,
        events: &[EventRecord],
        range: &TimeRange,
    ) -> SyncResult<Vec<TargetReport>> {
        info!(start = %range.start, end = %range.end, "Querying existing events");

        let mut reports = Vec::with_capacity(self.targets.len());
        let mut first_error = None;
        for target in &self.targets {
            match target.reference.get_in_range(range).await {
                Ok(mut existing) => {
                    let returned = existing.len();
                    existing.retain(|e| range.contains(e.timestamp));
                    if existing.len() < returned {
                        warn!(
                            sync_target = %target.name,
                            dropped = returned - existing.len(),
                            "Store returned events outside the queried range"
                        );
                    }
                    info!(
                        sync_target = %target.name,
                        existing = existing.len(),
                        "Retrieved existing events"
                    );

                    let plan = reconcile(events.to_vec(), &existing);
                    log_changes(&target.name, &plan);
                    reports.push(TargetReport::planned(&target.name, existing.len(), plan));
                }
                Err(e) => {
                    error!(
                        sync_target = %target.name,
                        error = %e,
                        "Failed to query existing events, skipping target"
                    );
                    reports.push(TargetReport::unreachable(&target.name, &e));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if reports.iter().all(TargetReport::is_skipped) {
            if let Some(e) = first_error {
                return Err(SyncError::ExistingQuery(e));
            }
        }
        Ok(reports)
    }

    async fn write_target(
        &self,
        target: &SyncTarget,
        plan: &Reconciliation,
    ) -> Vec<DestinationTally> {
        let mut tallies: Vec<DestinationTally> = target
            .sinks
            .iter()
            .map(|s| DestinationTally::new(s.name()))
            .collect();

        if plan.is_noop() {
            info!(sync_target = %target.name, "No new or updated event to write");
            return tallies;
        }
        if target.sinks.is_empty() {
            warn!(
                sync_target = %target.name,
                writes = plan.write_count(),
                "No destination attached, pending writes dropped"
            );
            return tallies;
        }
        info!(
            sync_target = %target.name,
            writes = plan.write_count(),
            destinations = target.sinks.len(),
            "Writing events"
        );

        let mut writes = stream::iter(plan.writes())
            .map(|record| self.write_one(&target.sinks, record))
            .buffer_unordered(self.config.max_concurrent_writes.max(1));

        while let Some(written) = writes.next().await {
            for (tally, ok) in tallies.iter_mut().zip(written) {
                if ok {
                    tally.succeeded += 1;
                } else {
                    tally.failed += 1;
                }
            }
        }

        for tally in &tallies {
            info!(
                sync_target = %target.name,
                destination = %tally.name,
                succeeded = tally.succeeded,
                failed = tally.failed,
                "Destination write summary"
            );
        }
        tallies
    }

    /// Upserts one record to every sink concurrently.
    ///
    /// Returns one success flag per sink, in sink order.
    async fn write_one(&self, sinks: &[Arc<dyn EventSink>], record: &EventRecord) -> Vec<bool> {
        let timeout = self.config.write_timeout;
        let label = record.label();

        let writes = sinks.iter().map(|sink| {
            let label = &label;
            async move {
                let failure = match tokio::time::timeout(timeout, sink.upsert(record)).await {
                    Ok(Ok(ack)) if ack.success => {
                        debug!(destination = sink.name(), event = %label, "Event written");
                        return true;
                    }
                    Ok(Ok(ack)) => ack.message_or_default().to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(_) => StoreError::Timeout(timeout).to_string(),
                };
                warn!(
                    destination = sink.name(),
                    event = %label,
                    error = %failure,
                    "Failed to write event"
                );
                false
            }
        });

        join_all(writes).await
    }
}

fn log_changes(target: &str, plan: &Reconciliation) {
    for update in &plan.to_update {
        let label = update.scraped.label();
        for change in &update.changes {
            info!(
                sync_target = target,
                event = %label,
                field = change.field.as_str(),
                previous = change.previous.as_deref().unwrap_or("(none)"),
                current = change.current.as_deref().unwrap_or("(none)"),
                "Event field changed"
            );
        }
    }
}
