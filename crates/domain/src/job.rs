use crate::lease::OwnerToken;

/// Lifecycle state of one scheduled job on this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    /// No run in progress.
    #[default]
    Idle,
    /// Attempting to acquire the cluster-wide lease.
    Acquiring,
    /// Executing the unit of work under a held lease.
    Running,
    /// The last run aborted because lease ownership was lost.
    Fatal,
}

impl JobState {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Running => "running",
            Self::Fatal => "fatal",
        }
    }
}

/// Why a tick did not execute the unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A previous tick of the same job is still running on this node.
    LocalRunInProgress,
    /// Another node holds the cluster-wide lease.
    LeaseHeldElsewhere,
    /// The lock store could not be reached within the acquisition bound.
    LockStoreUnavailable,
}

impl SkipReason {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalRunInProgress => "local_run_in_progress",
            Self::LeaseHeldElsewhere => "lease_held_elsewhere",
            Self::LockStoreUnavailable => "lock_store_unavailable",
        }
    }
}

/// Non-error result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunOutcome {
    /// The unit of work ran to completion.
    Completed,
    /// The tick was skipped without running the unit of work.
    Skipped(SkipReason),
}

/// Per-process view of one job's scheduling state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRunState {
    /// Job name.
    pub job_name: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Owner token of the lease tracked as held, if any.
    pub lease_token: Option<OwnerToken>,
}

impl JobRunState {
    /// Creates the idle state for a job that has never held a lease.
    #[must_use]
    pub fn idle(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            state: JobState::Idle,
            lease_token: None,
        }
    }

    /// Returns true while a local run is acquiring or executing.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self.state, JobState::Acquiring | JobState::Running)
    }
}
