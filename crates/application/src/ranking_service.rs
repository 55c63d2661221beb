use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotlist_core::{AppError, AppResult};
use hotlist_domain::{BoundedTopN, RankableItem, ScoreFn, TopNResult, default_score_fn};
use tracing::{debug, info};

use crate::job_ports::{JobContext, JobWork};
use crate::ranking_ports::{InteractionCountFetcher, RankableItemLister, RankingResultSink};

/// Name of the ranking job and of its cluster lock.
pub const RANKING_JOB_NAME: &str = "ranking_job";

/// Tuning for one ranking computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingConfig {
    /// Length of the published ranking.
    pub top_n: usize,
    /// Items requested per page.
    pub batch_size: usize,
    /// Safety bound on pages fetched per run.
    pub max_pages: usize,
    /// Pagination stops after the first page reaching items older than this.
    pub window: chrono::Duration,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            top_n: 100,
            batch_size: 100,
            max_pages: 1000,
            window: chrono::Duration::days(7),
        }
    }
}

impl RankingConfig {
    /// Rejects zero sizes and non-positive windows.
    pub fn validate(&self) -> AppResult<()> {
        if self.top_n == 0 || self.batch_size == 0 || self.max_pages == 0 {
            return Err(AppError::Validation(
                "ranking top_n, batch_size and max_pages must be greater than zero".to_owned(),
            ));
        }

        if self.window <= chrono::Duration::zero() {
            return Err(AppError::Validation(
                "ranking window must be positive".to_owned(),
            ));
        }

        Ok(())
    }
}

/// Paginated fan-in over the content lister and interaction counts.
pub struct RankingEngine {
    lister: Arc<dyn RankableItemLister>,
    counts: Arc<dyn InteractionCountFetcher>,
    score_fn: ScoreFn,
    config: RankingConfig,
}

impl RankingEngine {
    /// Creates an engine scoring with [`hotlist_domain::decaying_score`].
    pub fn new(
        lister: Arc<dyn RankableItemLister>,
        counts: Arc<dyn InteractionCountFetcher>,
        config: RankingConfig,
    ) -> AppResult<Self> {
        config.validate()?;

        Ok(Self {
            lister,
            counts,
            score_fn: default_score_fn(),
            config,
        })
    }

    /// Replaces the scoring function.
    #[must_use]
    pub fn with_score_fn(mut self, score_fn: ScoreFn) -> Self {
        self.score_fn = score_fn;
        self
    }

    /// Computes the ranking as of `now`.
    ///
    /// Pages are fetched strictly in offset order. Counts are requested for
    /// every page, including an empty last page. Any upstream error aborts the
    /// whole computation.
    pub async fn compute_top_n(&self, now: DateTime<Utc>) -> AppResult<TopNResult> {
        let cutoff = now
            .checked_sub_signed(self.config.window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let batch_size = self.config.batch_size;
        let mut top = BoundedTopN::new(self.config.top_n);
        let mut offset = 0_usize;
        let mut pages = 0_usize;
        let mut scanned = 0_usize;

        while pages < self.config.max_pages {
            let page = self.lister.list_page(now, offset, batch_size).await?;
            let ids = page.iter().map(|item| item.id).collect::<Vec<_>>();
            let counts = self.counts.get_counts(&ids).await?;
            pages += 1;

            for item in &page {
                let count = counts.get(&item.id).copied().unwrap_or(0);
                top.push(RankableItem::new(*item, count).score(&self.score_fn, now));
            }
            scanned += page.len();

            let reached_end = page.len() < batch_size;
            let left_window = page.last().is_some_and(|item| item.updated_at < cutoff);
            if reached_end || left_window {
                break;
            }

            offset = offset.saturating_add(batch_size);
        }

        debug!(pages, scanned, kept = top.len(), "ranking computed");
        Ok(TopNResult::from_ranked(&top.into_ranked(), now))
    }
}

/// Ranking unit of work: compute, then publish unless the run was aborted.
pub struct RankingService {
    engine: RankingEngine,
    sink: Arc<dyn RankingResultSink>,
}

impl RankingService {
    /// Creates the service.
    #[must_use]
    pub fn new(engine: RankingEngine, sink: Arc<dyn RankingResultSink>) -> Self {
        Self { engine, sink }
    }
}

#[async_trait]
impl JobWork for RankingService {
    fn name(&self) -> &str {
        RANKING_JOB_NAME
    }

    async fn execute(&self, context: &JobContext) -> AppResult<()> {
        let result = self.engine.compute_top_n(Utc::now()).await?;

        context.ensure_active()?;
        self.sink.replace_top_n(&result).await?;

        info!(
            job = RANKING_JOB_NAME,
            items = result.item_ids.len(),
            "ranking published"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests;
