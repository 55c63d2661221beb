use async_trait::async_trait;
use hotlist_core::{AppError, AppResult};
use hotlist_domain::JobRunOutcome;
use tokio_util::sync::CancellationToken;

/// Cancellation scope handed to one job run.
#[derive(Debug, Clone, Default)]
pub struct JobContext {
    cancellation: CancellationToken,
}

impl JobContext {
    /// Creates a root context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context cancelled together with this one.
    #[must_use]
    pub fn child(&self) -> Self {
        Self {
            cancellation: self.cancellation.child_token(),
        }
    }

    /// Cancels this context and every child.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    /// Returns true once the run has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Completes when the run is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }

    /// Fails with `Cancelled` once the run has been cancelled.
    pub fn ensure_active(&self) -> AppResult<()> {
        if self.is_cancelled() {
            return Err(AppError::Cancelled(
                "job run was cancelled before completion".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Unit the scheduler drives on every tick.
#[async_trait]
pub trait Job: Send + Sync {
    /// Stable job name, unique per process.
    fn name(&self) -> &str;

    /// Runs one tick. Contention is reported as a skipped outcome, not an error.
    async fn run(&self, context: &JobContext) -> AppResult<JobRunOutcome>;

    /// Releases resources held across ticks.
    async fn close(&self) -> AppResult<()>;
}

/// Plain unit of work wrapped by a job runner.
#[async_trait]
pub trait JobWork: Send + Sync {
    /// Stable work name, used as the job and lock name.
    fn name(&self) -> &str;

    /// Executes the work once.
    async fn execute(&self, context: &JobContext) -> AppResult<()>;
}
