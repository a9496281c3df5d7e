//! Periodic trigger for sync runs.
//!
//! Runs once immediately, then on every interval tick. A run is always
//! awaited before the next tick is considered, so runs never overlap; ticks
//! missed while a run was in progress are skipped rather than replayed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::pipeline::RunOutcome;

/// Trigger configuration.
#[derive(Debug, Clone)]
pub struct TriggerConfig {
    /// Time between two run starts.
    pub interval: Duration,
}

impl TriggerConfig {
    /// Default interval in seconds.
    pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

    /// Shortest accepted interval.
    pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

    /// Creates a configuration; the interval is raised to [`Self::MIN_INTERVAL`].
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Self::MIN_INTERVAL),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(Self::DEFAULT_INTERVAL_SECS))
    }
}

/// Commands accepted by a running trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCommand {
    /// Start a run now instead of waiting for the next tick.
    RunNow,
    /// Stop after the current run.
    Stop,
}

/// What the trigger has seen so far.
#[derive(Debug, Clone, Default)]
pub struct TriggerState {
    pub runs: u64,
    pub consecutive_failures: u32,
    pub last_run: Option<DateTime<Utc>>,
    pub last_outcome: Option<RunOutcome>,
    pub last_error: Option<String>,
    /// Whether the last abort may clear up on its own by the next run.
    pub last_error_transient: bool,
}

impl TriggerState {
    /// Records a run that reached the write phase or finished cleanly.
    pub fn record_outcome(&mut self, outcome: RunOutcome) {
        self.runs += 1;
        self.last_run = Some(Utc::now());
        self.last_outcome = Some(outcome);
        self.last_error = None;
        self.last_error_transient = false;
        if outcome == RunOutcome::Failed {
            self.consecutive_failures += 1;
        } else {
            self.consecutive_failures = 0;
        }
    }

    /// Records an aborted run.
    pub fn record_failure(&mut self, error: impl Into<String>, transient: bool) {
        self.runs += 1;
        self.last_run = Some(Utc::now());
        self.last_outcome = Some(RunOutcome::Failed);
        self.last_error = Some(error.into());
        self.last_error_transient = transient;
        self.consecutive_failures += 1;
    }
}

/// Shared trigger state.
pub type SharedTriggerState = Arc<RwLock<TriggerState>>;

/// Fires sync runs on a fixed interval.
pub struct Trigger {
    config: TriggerConfig,
    state: SharedTriggerState,
    command_tx: mpsc::Sender<TriggerCommand>,
    command_rx: mpsc::Receiver<TriggerCommand>,
}

impl Trigger {
    pub fn new(config: TriggerConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(8);
        Self {
            config,
            state: Arc::new(RwLock::new(TriggerState::default())),
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the trigger.
    pub fn handle(&self) -> TriggerHandle {
        TriggerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> SharedTriggerState {
        self.state.clone()
    }

    /// Runs until stopped.
    ///
    /// `run_fn` performs one run and reports its outcome, or the reason it
    /// aborted.
    pub async fn run<F, Fut>(self, run_fn: F)
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<RunOutcome, SyncError>>,
    {
        let Self {
            config,
            state,
            mut command_rx,
            ..
        } = self;

        let period = config.interval.max(TriggerConfig::MIN_INTERVAL);
        info!(interval_secs = period.as_secs(), "Trigger started");

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                cmd = command_rx.recv() => match cmd {
                    Some(TriggerCommand::RunNow) => {
                        debug!("Received RunNow command");
                        fire(&state, &run_fn).await;
                        ticker.reset();
                    }
                    Some(TriggerCommand::Stop) | None => {
                        info!("Trigger stopping");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    fire(&state, &run_fn).await;
                }
            }
        }
    }
}

async fn fire<F, Fut>(state: &SharedTriggerState, run_fn: &F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<RunOutcome, SyncError>>,
{
    debug!("Starting triggered run");
    match run_fn().await {
        Ok(outcome) => {
            debug!(outcome = %outcome, "Triggered run finished");
            state.write().await.record_outcome(outcome);
        }
        Err(e) => {
            let transient = e.is_transient();
            warn!(error = %e, transient, "Triggered run aborted");
            state.write().await.record_failure(e.to_string(), transient);
        }
    }
}

/// Handle for controlling a running [`Trigger`].
#[derive(Clone, Debug)]
pub struct TriggerHandle {
    command_tx: mpsc::Sender<TriggerCommand>,
    state: SharedTriggerState,
}

impl TriggerHandle {
    /// Requests an immediate run.
    pub async fn run_now(&self) -> Result<(), mpsc::error::SendError<TriggerCommand>> {
        self.command_tx.send(TriggerCommand::RunNow).await
    }

    /// Stops the trigger once the current run, if any, has finished.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<TriggerCommand>> {
        self.command_tx.send(TriggerCommand::Stop).await
    }

    /// Returns a snapshot of the trigger state.
    pub async fn state(&self) -> TriggerState {
        self.state.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    #[test]
    fn default_interval_is_hourly() {
        assert_eq!(TriggerConfig::default().interval, Duration::from_secs(3600));
    }

    #[test]
    fn zero_interval_is_raised() {
        assert_eq!(TriggerConfig::new(Duration::ZERO).interval, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_field_does_not_panic() {
        let trigger = Trigger::new(TriggerConfig {
            interval: Duration::ZERO,
        });
        let handle = trigger.handle();

        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let task = tokio::spawn(trigger.run(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RunOutcome::Success)
            }
        }));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        handle.stop().await.unwrap();
        task.await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn state_tracks_failures() {
        let mut state = TriggerState::default();
        state.record_failure("fetch failed", true);
        assert!(state.last_error_transient);
        state.record_outcome(RunOutcome::Failed);
        assert_eq!(state.runs, 2);
        assert_eq!(state.consecutive_failures, 2);
        assert!(state.last_error.is_none());

        state.record_outcome(RunOutcome::Partial);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.last_outcome, Some(RunOutcome::Partial));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_immediately_then_every_interval() {
        let trigger = Trigger::new(TriggerConfig::new(Duration::from_secs(60)));
        let handle = trigger.handle();

        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let task = tokio::spawn(trigger.run(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RunOutcome::Success)
            }
        }));

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        handle.stop().await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.state().await.runs, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn runs_never_overlap() {
        let trigger = Trigger::new(TriggerConfig::new(Duration::from_secs(10)));
        let handle = trigger.handle();

        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (f, p) = (in_flight.clone(), peak.clone());
        let task = tokio::spawn(trigger.run(move || {
            let (f, p) = (f.clone(), p.clone());
            async move {
                let now = f.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(25)).await;
                f.fetch_sub(1, Ordering::SeqCst);
                Ok(RunOutcome::Success)
            }
        }));

        tokio::time::sleep(Duration::from_secs(120)).await;
        handle.stop().await.unwrap();
        task.await.unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(handle.state().await.runs >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn aborted_runs_are_recorded_and_loop_continues() {
        let trigger = Trigger::new(TriggerConfig::new(Duration::from_secs(30)));
        let handle = trigger.handle();

        let task = tokio::spawn(trigger.run(|| async { Err(SyncError::EmptyBatch) }));

        tokio::time::sleep(Duration::from_secs(45)).await;
        let state = handle.state().await;
        assert_eq!(state.runs, 2);
        assert_eq!(state.consecutive_failures, 2);
        assert_eq!(
            state.last_error.as_deref(),
            Some("no event could be extracted from the calendar page")
        );
        assert!(!state.last_error_transient);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn run_now_fires_between_ticks() {
        let trigger = Trigger::new(TriggerConfig::new(Duration::from_secs(3600)));
        let handle = trigger.handle();

        let count = Arc::new(AtomicU32::new(0));
        let counter = count.clone();
        let task = tokio::spawn(trigger.run(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(RunOutcome::Success)
            }
        }));

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.run_now().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
