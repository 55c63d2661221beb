use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hotlist_core::{AppError, AppResult};
use hotlist_domain::{JobRunOutcome, JobRunState, JobState, Lease, SkipReason};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auto_extending_lease::{AutoExtendingLease, DEFAULT_EXTEND_TIMEOUT, LeaseLossSignal};
use crate::distributed_lock::DistributedLock;
use crate::job_ports::{Job, JobContext, JobWork};

/// Default bound on one lease acquisition attempt.
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(1);

/// Timing configuration for one [`JobRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobRunnerConfig {
    /// Lease time-to-live set on acquisition and on every extension.
    pub lease_duration: Duration,
    /// Delay between lease extensions.
    pub renew_interval: Duration,
    /// Bound on one acquisition attempt.
    pub acquire_timeout: Duration,
    /// Bound on one extension call.
    pub extend_timeout: Duration,
    /// Deadline for one execution of the unit of work.
    pub run_timeout: Duration,
}

impl JobRunnerConfig {
    /// Derives a configuration where the lease lives as long as one run's
    /// deadline and is renewed at half that period.
    #[must_use]
    pub fn for_run_timeout(run_timeout: Duration) -> Self {
        Self {
            lease_duration: run_timeout,
            renew_interval: run_timeout / 2,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            extend_timeout: DEFAULT_EXTEND_TIMEOUT,
            run_timeout,
        }
    }

    /// Checks interval relationships required for safe renewal.
    pub fn validate(&self) -> AppResult<()> {
        if self.lease_duration.as_millis() == 0 {
            return Err(AppError::Validation(
                "job lease duration must be at least one millisecond".to_owned(),
            ));
        }

        if self.renew_interval.is_zero() || self.renew_interval >= self.lease_duration {
            return Err(AppError::Validation(
                "job renew interval must be positive and shorter than the lease duration"
                    .to_owned(),
            ));
        }

        if self.acquire_timeout.is_zero() || self.extend_timeout.is_zero() {
            return Err(AppError::Validation(
                "job acquire and extend timeouts must be greater than zero".to_owned(),
            ));
        }

        if self.run_timeout.is_zero() {
            return Err(AppError::Validation(
                "job run timeout must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }
}

struct HeldLease {
    lease: Lease,
    signal: LeaseLossSignal,
}

enum LeaseCheck {
    Held(LeaseLossSignal),
    Skip(SkipReason),
}

enum RunEnd {
    Finished(AppResult<()>),
    Cancelled,
    LeaseLost(AppError),
}

/// Runs a unit of work on at most one node of the cluster at a time.
///
/// A local guard skips ticks that overlap a run still in progress. The
/// cluster lease is acquired once and kept across ticks, renewed in the
/// background until [`Job::close`].
pub struct JobRunner {
    work: Arc<dyn JobWork>,
    lock: DistributedLock,
    renewer: AutoExtendingLease,
    config: JobRunnerConfig,
    local_guard: Mutex<()>,
    held: Mutex<Option<HeldLease>>,
    state: RwLock<JobState>,
}

impl JobRunner {
    /// Creates a runner for `work`, using the work name as the lock name.
    pub fn new(
        work: Arc<dyn JobWork>,
        lock: DistributedLock,
        config: JobRunnerConfig,
    ) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            renewer: AutoExtendingLease::new(lock.clone())
                .with_extend_timeout(config.extend_timeout),
            work,
            lock,
            config,
            local_guard: Mutex::new(()),
            held: Mutex::new(None),
            state: RwLock::new(JobState::Idle),
        })
    }

    /// Returns a snapshot of this job's scheduling state.
    pub async fn state(&self) -> JobRunState {
        let lease_token = self
            .held
            .lock()
            .await
            .as_ref()
            .map(|held| held.lease.owner_token().clone());

        JobRunState {
            state: *self.state.read().await,
            lease_token,
            ..JobRunState::idle(self.work.name())
        }
    }

    async fn set_state(&self, state: JobState) {
        *self.state.write().await = state;
    }

    async fn acquire_or_confirm_lease(&self) -> AppResult<LeaseCheck> {
        let job_name = self.work.name();
        let mut held = self.held.lock().await;

        if let Some(current) = held.as_ref() {
            match current.signal.current() {
                None => return Ok(LeaseCheck::Held(current.signal.clone())),
                Some(loss) => {
                    warn!(
                        job = %job_name,
                        error = %loss,
                        "tracked lease was lost between runs, reacquiring"
                    );
                    self.renewer.stop().await;
                    *held = None;
                }
            }
        }

        self.set_state(JobState::Acquiring).await;
        let attempt = tokio::time::timeout(
            self.config.acquire_timeout,
            self.lock.try_acquire(job_name, self.config.lease_duration),
        )
        .await;

        let lease = match attempt {
            Ok(Ok(Some(lease))) => lease,
            Ok(Ok(None)) => {
                debug!(job = %job_name, "job lease held by another node, skipping tick");
                return Ok(LeaseCheck::Skip(SkipReason::LeaseHeldElsewhere));
            }
            Ok(Err(acquire_error)) => {
                warn!(
                    job = %job_name,
                    error = %acquire_error,
                    "lock store unavailable, skipping tick"
                );
                return Ok(LeaseCheck::Skip(SkipReason::LockStoreUnavailable));
            }
            Err(_) => {
                warn!(
                    job = %job_name,
                    timeout = ?self.config.acquire_timeout,
                    "job lease acquisition timed out, skipping tick"
                );
                return Ok(LeaseCheck::Skip(SkipReason::LockStoreUnavailable));
            }
        };

        let signal = match self
            .renewer
            .start(
                lease.clone(),
                self.config.lease_duration,
                self.config.renew_interval,
            )
            .await
        {
            Ok(signal) => signal,
            Err(start_error) => {
                if let Err(release_error) = self.lock.release(&lease).await {
                    warn!(
                        job = %job_name,
                        error = %release_error,
                        "failed to release lease after renewal start failure"
                    );
                }
                return Err(start_error);
            }
        };

        info!(
            job = %job_name,
            holder_id = %self.lock.holder_id(),
            expires_at = %lease.expires_at(),
            "job lease acquired"
        );

        *held = Some(HeldLease {
            lease,
            signal: signal.clone(),
        });

        Ok(LeaseCheck::Held(signal))
    }

    async fn execute_under_lease(
        &self,
        context: &JobContext,
        mut signal: LeaseLossSignal,
    ) -> AppResult<()> {
        let run_context = context.child();

        let end = tokio::select! {
            biased;
            loss = signal.lost() => RunEnd::LeaseLost(loss),
            () = context.cancelled() => RunEnd::Cancelled,
            executed = tokio::time::timeout(
                self.config.run_timeout,
                self.work.execute(&run_context),
            ) => RunEnd::Finished(executed.unwrap_or_else(|_| {
                Err(AppError::Timeout(format!(
                    "job '{}' exceeded its {:?} deadline",
                    self.work.name(),
                    self.config.run_timeout
                )))
            })),
        };
        run_context.cancel();

        match end {
            RunEnd::Finished(result) => {
                self.set_state(JobState::Idle).await;
                result
            }
            RunEnd::Cancelled => {
                warn!(job = %self.work.name(), "job run cancelled by caller");
                self.set_state(JobState::Idle).await;
                Err(AppError::Cancelled(format!(
                    "job '{}' was cancelled before completion",
                    self.work.name()
                )))
            }
            RunEnd::LeaseLost(loss) => Err(self.abort_on_lease_loss(loss).await),
        }
    }

    async fn abort_on_lease_loss(&self, loss: AppError) -> AppError {
        let job_name = self.work.name();
        error!(job = %job_name, error = %loss, "job lease lost mid-run, aborting");

        self.renewer.stop().await;
        *self.held.lock().await = None;
        self.set_state(JobState::Fatal).await;

        AppError::LeaseLost(format!("job '{job_name}' lost its lease: {loss}"))
    }
}

#[async_trait]
impl Job for JobRunner {
    fn name(&self) -> &str {
        self.work.name()
    }

    async fn run(&self, context: &JobContext) -> AppResult<JobRunOutcome> {
        let Ok(_guard) = self.local_guard.try_lock() else {
            debug!(job = %self.work.name(), "previous run still in progress, skipping tick");
            return Ok(JobRunOutcome::Skipped(SkipReason::LocalRunInProgress));
        };

        let signal = match self.acquire_or_confirm_lease().await {
            Ok(LeaseCheck::Held(signal)) => signal,
            Ok(LeaseCheck::Skip(reason)) => {
                self.set_state(JobState::Idle).await;
                return Ok(JobRunOutcome::Skipped(reason));
            }
            Err(lease_error) => {
                self.set_state(JobState::Idle).await;
                return Err(lease_error);
            }
        };

        self.set_state(JobState::Running).await;
        self.execute_under_lease(context, signal).await?;

        Ok(JobRunOutcome::Completed)
    }

    async fn close(&self) -> AppResult<()> {
        let _guard = self.local_guard.lock().await;
        let job_name = self.work.name();

        self.renewer.stop().await;
        if let Some(held) = self.held.lock().await.take() {
            match self.lock.release(&held.lease).await {
                Ok(()) => info!(job = %job_name, "job lease released"),
                Err(release_error) => warn!(
                    job = %job_name,
                    error = %release_error,
                    "failed to release job lease on shutdown, it will expire on its own"
                ),
            }
        }

        self.set_state(JobState::Idle).await;
        Ok(())
    }
}
