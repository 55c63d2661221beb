//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod job;
mod lease;
mod ranking;
mod top_n;

pub use job::{JobRunOutcome, JobRunState, JobState, SkipReason};
pub use lease::{Lease, OwnerToken};
pub use ranking::{
    ContentItem, DEFAULT_SCORE_GRAVITY, RankableItem, ScoreFn, ScoredItem, TopNResult,
    decaying_score, default_score_fn,
};
pub use top_n::BoundedTopN;
