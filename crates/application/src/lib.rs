//! Application services and ports.

#![forbid(unsafe_code)]

mod auto_extending_lease;
mod distributed_lock;
mod job_ports;
mod job_runner;
mod lease_ports;
mod ranking_ports;
mod ranking_service;
mod scheduler;

#[cfg(test)]
mod test_support;

pub use auto_extending_lease::{AutoExtendingLease, DEFAULT_EXTEND_TIMEOUT, LeaseLossSignal};
pub use distributed_lock::DistributedLock;
pub use job_ports::{Job, JobContext, JobWork};
pub use job_runner::{DEFAULT_ACQUIRE_TIMEOUT, JobRunner, JobRunnerConfig};
pub use lease_ports::LeaseStore;
pub use ranking_ports::{InteractionCountFetcher, RankableItemLister, RankingResultSink};
pub use ranking_service::{RANKING_JOB_NAME, RankingConfig, RankingEngine, RankingService};
pub use scheduler::{JobRunStats, Scheduler, TickOutcome};
