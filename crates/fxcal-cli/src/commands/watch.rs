//! `fxcal watch`: periodic sync until interrupted.

use std::sync::Arc;
use std::time::Duration;

use fxcal_sync::{Trigger, TriggerConfig};
use tracing::{info, warn};

use crate::commands::sync::build_pipeline;
use crate::config::FxcalConfig;
use crate::error::ClientResult;

/// Runs the pipeline now and then every `interval`, until Ctrl-C.
///
/// A run in progress when the interrupt arrives is allowed to finish.
pub async fn run(config: &FxcalConfig, interval: Duration, dry_run: bool) -> ClientResult<()> {
    let pipeline = Arc::new(build_pipeline(config, dry_run)?);

    let trigger = Trigger::new(TriggerConfig::new(interval));
    let handle = trigger.handle();

    tokio::spawn({
        let handle = handle.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Interrupt received, stopping after the current run");
                    let _ = handle.stop().await;
                }
                Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
            }
        }
    });

    trigger
        .run(move || {
            let pipeline = pipeline.clone();
            async move {
                pipeline.run().await.map(|report| report.outcome)
            }
        })
        .await;

    let state = handle.state().await;
    info!(
        runs = state.runs,
        consecutive_failures = state.consecutive_failures,
        "Watch stopped"
    );
    Ok(())
}
