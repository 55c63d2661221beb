use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gravity exponent applied to item age by [`decaying_score`].
pub const DEFAULT_SCORE_GRAVITY: f64 = 1.5;

/// Pluggable scoring function of (interaction count, update timestamp, now).
pub type ScoreFn = Arc<dyn Fn(i64, DateTime<Utc>, DateTime<Utc>) -> f64 + Send + Sync>;

/// One content item as returned by the content lister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Item identifier.
    pub id: i64,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Content item joined with its raw interaction count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankableItem {
    /// Item identifier.
    pub id: i64,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
    /// Raw interaction count, zero when the count store has no entry.
    pub interaction_count: i64,
}

impl RankableItem {
    /// Joins one content item with its interaction count.
    #[must_use]
    pub fn new(item: ContentItem, interaction_count: i64) -> Self {
        Self {
            id: item.id,
            updated_at: item.updated_at,
            interaction_count,
        }
    }

    /// Scores this item with `score_fn` at `now`.
    #[must_use]
    pub fn score(&self, score_fn: &ScoreFn, now: DateTime<Utc>) -> ScoredItem {
        ScoredItem::new(
            self.id,
            self.updated_at,
            score_fn(self.interaction_count, self.updated_at, now),
        )
    }
}

/// Item with a computed score.
///
/// Ranking order is score descending, then update timestamp descending, then
/// id descending. Non-finite scores rank below every finite score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredItem {
    /// Item identifier.
    pub id: i64,
    /// Last update timestamp, first tie-break key.
    pub updated_at: DateTime<Utc>,
    /// Computed score.
    pub score: f64,
}

impl ScoredItem {
    /// Creates a scored item, normalizing NaN to negative infinity.
    #[must_use]
    pub fn new(id: i64, updated_at: DateTime<Utc>, score: f64) -> Self {
        let score = if score.is_nan() {
            f64::NEG_INFINITY
        } else {
            score
        };

        Self {
            id,
            updated_at,
            score,
        }
    }

    /// Compares two items by rank. `Greater` means `self` ranks higher.
    #[must_use]
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.updated_at.cmp(&other.updated_at))
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Ordered output of one ranking computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopNResult {
    /// Item ids, best first.
    pub item_ids: Vec<i64>,
    /// Instant the scores were computed for.
    pub computed_at: DateTime<Utc>,
}

impl TopNResult {
    /// Builds a result from items already sorted best first.
    #[must_use]
    pub fn from_ranked(ranked: &[ScoredItem], computed_at: DateTime<Utc>) -> Self {
        Self {
            item_ids: ranked.iter().map(|item| item.id).collect(),
            computed_at,
        }
    }
}

/// Default score: grows with interaction count and decays with age.
///
/// `(count - 1) / (age_hours + 2) ^ 1.5`, with negative ages clamped to zero.
#[must_use]
pub fn decaying_score(
    interaction_count: i64,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let age_seconds = now.signed_duration_since(updated_at).num_seconds().max(0);
    let age_hours = age_seconds as f64 / 3600.0;
    (interaction_count as f64 - 1.0) / (age_hours + 2.0).powf(DEFAULT_SCORE_GRAVITY)
}

/// Returns [`decaying_score`] as a shareable [`ScoreFn`].
#[must_use]
pub fn default_score_fn() -> ScoreFn {
    Arc::new(decaying_score)
}
