use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use hotlist_core::{AppError, AppResult};
use hotlist_domain::{JobRunOutcome, SkipReason};
use tokio::sync::RwLock;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::job_ports::{Job, JobContext};

type SharedStats = Arc<RwLock<HashMap<String, JobRunStats>>>;

/// Result of one scheduled tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// The job ran to completion.
    Completed,
    /// The job declined to run this tick.
    Skipped(SkipReason),
    /// The job ran and failed.
    Failed(AppError),
}

/// Per-job tick bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobRunStats {
    /// Ticks that completed.
    pub completed: u64,
    /// Ticks that were skipped.
    pub skipped: u64,
    /// Ticks that failed.
    pub failed: u64,
    /// Outcome of the most recent tick.
    pub last_outcome: Option<TickOutcome>,
    /// Wall time of the most recent tick.
    pub last_duration: Option<Duration>,
}

impl JobRunStats {
    fn record(&mut self, outcome: TickOutcome, duration: Duration) {
        match &outcome {
            TickOutcome::Completed => self.completed += 1,
            TickOutcome::Skipped(_) => self.skipped += 1,
            TickOutcome::Failed(_) => self.failed += 1,
        }

        self.last_outcome = Some(outcome);
        self.last_duration = Some(duration);
    }
}

struct ScheduledJob {
    job: Arc<dyn Job>,
    interval: Duration,
}

/// Fixed-interval dispatcher for registered jobs.
///
/// Each job gets its own loop, so a slow or failing job never delays the
/// others. The first tick fires one interval after [`Scheduler::start`].
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    stats: SharedStats,
    shutdown: CancellationToken,
    loops: JoinSet<()>,
    started: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            stats: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            loops: JoinSet::new(),
            started: false,
        }
    }

    /// Registers `job` to run every `interval`.
    pub fn register(&mut self, job: Arc<dyn Job>, interval: Duration) -> AppResult<()> {
        if self.started {
            return Err(AppError::Conflict(format!(
                "cannot register job '{}' after the scheduler started",
                job.name()
            )));
        }

        if interval.is_zero() {
            return Err(AppError::Validation(format!(
                "job '{}' interval must be greater than zero",
                job.name()
            )));
        }

        if self
            .jobs
            .iter()
            .any(|scheduled| scheduled.job.name() == job.name())
        {
            return Err(AppError::Conflict(format!(
                "job '{}' is already registered",
                job.name()
            )));
        }

        self.jobs.push(ScheduledJob { job, interval });
        Ok(())
    }

    /// Starts one dispatch loop per registered job.
    pub fn start(&mut self) -> AppResult<()> {
        if self.started {
            return Err(AppError::AlreadyRunning(
                "scheduler already started".to_owned(),
            ));
        }

        if self.shutdown.is_cancelled() {
            return Err(AppError::Conflict(
                "scheduler was shut down and cannot be restarted".to_owned(),
            ));
        }

        self.started = true;
        for scheduled in &self.jobs {
            info!(
                job = %scheduled.job.name(),
                interval = ?scheduled.interval,
                "job scheduled"
            );
            self.loops.spawn(dispatch_loop(
                scheduled.job.clone(),
                scheduled.interval,
                self.stats.clone(),
                self.shutdown.clone(),
            ));
        }

        info!(jobs = self.jobs.len(), "scheduler started");
        Ok(())
    }

    /// Returns a snapshot of per-job tick bookkeeping, keyed by job name.
    pub async fn run_stats(&self) -> HashMap<String, JobRunStats> {
        self.stats.read().await.clone()
    }

    /// Stops dispatching, waits for in-flight ticks, then closes every job.
    pub async fn shutdown(&mut self) {
        info!("scheduler shutting down");
        self.shutdown.cancel();

        while let Some(joined) = self.loops.join_next().await {
            if let Err(join_error) = joined {
                error!(error = %join_error, "job dispatch loop terminated abnormally");
            }
        }

        for scheduled in &self.jobs {
            if let Err(close_error) = scheduled.job.close().await {
                warn!(
                    job = %scheduled.job.name(),
                    error = %close_error,
                    "job close failed"
                );
            }
        }

        info!("scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn dispatch_loop(
    job: Arc<dyn Job>,
    interval: Duration,
    stats: SharedStats,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = JoinSet::new();

    loop {
        tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            Some(joined) = ticks.join_next() => report_panicked_tick(job.name(), joined),
            _ = ticker.tick() => {
                ticks.spawn(run_tick(job.clone(), stats.clone()));
            }
        }
    }

    while let Some(joined) = ticks.join_next().await {
        report_panicked_tick(job.name(), joined);
    }
}

async fn run_tick(job: Arc<dyn Job>, stats: SharedStats) {
    let started_at = Instant::now();
    let result = job.run(&JobContext::new()).await;
    let duration = started_at.elapsed();
    let duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);

    let outcome = match result {
        Ok(JobRunOutcome::Completed) => {
            info!(job = %job.name(), duration_ms, "job tick completed");
            TickOutcome::Completed
        }
        Ok(JobRunOutcome::Skipped(reason)) => {
            debug!(job = %job.name(), reason = reason.as_str(), "job tick skipped");
            TickOutcome::Skipped(reason)
        }
        Err(run_error) => {
            warn!(
                job = %job.name(),
                duration_ms,
                error = %run_error,
                "job tick failed"
            );
            TickOutcome::Failed(run_error)
        }
    };

    stats
        .write()
        .await
        .entry(job.name().to_owned())
        .or_default()
        .record(outcome, duration);
}

fn report_panicked_tick(job_name: &str, joined: Result<(), JoinError>) {
    if let Err(join_error) = joined {
        error!(job = %job_name, error = %join_error, "job tick panicked");
    }
}
