//! `fxcal sync`: one pipeline run.
//!
//! Also hosts the pipeline wiring shared with `watch`. The primary backend is
//! a target of its own, writing to itself and to InfluxDB when configured.
//! Every extra backend is a separate target, reconciled against its own
//! records and written back to itself.

use std::sync::Arc;

use fxcal_scraper::HttpFetcher;
use fxcal_sync::{BackendStore, InfluxStore, RunOutcome, RunReport, SyncPipeline, SyncTarget};
use tracing::info;

use crate::config::FxcalConfig;
use crate::error::{ClientError, ClientResult};

/// Builds the pipeline described by the configuration.
pub fn build_pipeline(config: &FxcalConfig, dry_run: bool) -> ClientResult<SyncPipeline> {
    let pipeline_config = config.pipeline_config(dry_run)?;
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch_config())?);
    let backend = Arc::new(BackendStore::new(config.backend_config()?)?);

    let mut primary = SyncTarget::new("backend", backend.clone()).with_sink(backend);
    if let Some(influx) = config.influx_config()? {
        primary = primary.with_sink(Arc::new(InfluxStore::new(&influx)?));
    }
    let mut pipeline = SyncPipeline::new(pipeline_config, fetcher).with_target(primary);

    for (name, extra) in config.extra_backend_configs()? {
        let store = Arc::new(BackendStore::new(extra)?.with_name(name.clone()));
        pipeline = pipeline.with_target(SyncTarget::new(name, store.clone()).with_sink(store));
    }

    for target in pipeline.targets() {
        info!(
            sync_target = target.name(),
            destinations = ?target.sink_names(),
            "Target attached"
        );
    }
    info!(
        targets = pipeline.targets().len(),
        dry_run,
        url = %pipeline.config().calendar_url,
        "Pipeline ready"
    );
    Ok(pipeline)
}

/// Runs the pipeline once and prints a summary.
///
/// Anything but a successful outcome is an error, so the exit code reflects it.
pub async fn run(config: &FxcalConfig, dry_run: bool) -> ClientResult<()> {
    let pipeline = build_pipeline(config, dry_run)?;
    let report = pipeline.run().await?;
    print!("{}", render_report(&report));

    match report.outcome {
        RunOutcome::Success => Ok(()),
        outcome => Err(ClientError::Outcome(outcome)),
    }
}

/// Renders a run report for the terminal.
pub fn render_report(report: &RunReport) -> String {
    let mut out = format!(
        "{}: {} parsed ({} skipped)\n",
        report.outcome, report.parsed, report.skipped,
    );

    for target in &report.targets {
        if let Some(ref error) = target.error {
            out.push_str(&format!("{}: skipped ({})\n", target.name, error));
            continue;
        }

        let plan = &target.plan;
        out.push_str(&format!(
            "{}: {} existing, {} new, {} updated, {} unchanged\n",
            target.name,
            target.existing,
            plan.to_add.len(),
            plan.to_update.len(),
            plan.unchanged.len(),
        ));

        if report.dry_run {
            for record in &plan.to_add {
                out.push_str(&format!("  + {}\n", record.label()));
            }
            for update in &plan.to_update {
                let fields: Vec<&str> =
                    update.changes.iter().map(|c| c.field.as_str()).collect();
                out.push_str(&format!(
                    "  ~ {} ({})\n",
                    update.scraped.label(),
                    fields.join(", ")
                ));
            }
        }

        for tally in &target.destinations {
            out.push_str(&format!(
                "  {}: {} written, {} failed\n",
                tally.name, tally.succeeded, tally.failed
            ));
        }
    }
    out
}
