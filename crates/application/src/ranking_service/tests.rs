use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hotlist_core::{AppError, AppResult};
use hotlist_domain::{ContentItem, ScoreFn, TopNResult};
use tokio::sync::Mutex;

use crate::test_support::FakeLeaseStore;
use crate::{
    DistributedLock, InteractionCountFetcher, Job, JobContext, JobRunner, JobRunnerConfig,
    JobWork, RankableItemLister, RankingResultSink,
};

use super::{RANKING_JOB_NAME, RankingConfig, RankingEngine, RankingService};

fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_767_225_600, 0).unwrap_or_else(|| unreachable!())
}

fn item(id: i64, hours_ago: i64) -> ContentItem {
    ContentItem {
        id,
        updated_at: now() - Duration::hours(hours_ago),
    }
}

fn count_score() -> ScoreFn {
    Arc::new(|count, _, _| count as f64)
}

#[derive(Default)]
struct FakeLister {
    pages: Vec<Vec<ContentItem>>,
    endless: bool,
    delay: Option<std::time::Duration>,
    failure: Option<AppError>,
    calls: Mutex<Vec<(usize, usize)>>,
}

impl FakeLister {
    fn with_pages(pages: Vec<Vec<ContentItem>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    async fn calls(&self) -> Vec<(usize, usize)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl RankableItemLister for FakeLister {
    async fn list_page(
        &self,
        _cursor_time: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> AppResult<Vec<ContentItem>> {
        self.calls.lock().await.push((offset, limit));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        if self.endless {
            return Ok((offset..offset + limit)
                .map(|id| item(id as i64, 1))
                .collect());
        }

        let index = offset / limit;
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
struct FakeCounts {
    counts: HashMap<i64, i64>,
    failure: Option<AppError>,
    calls: Mutex<Vec<Vec<i64>>>,
}

impl FakeCounts {
    fn with_counts(counts: &[(i64, i64)]) -> Self {
        Self {
            counts: counts.iter().copied().collect(),
            ..Self::default()
        }
    }

    async fn calls(&self) -> Vec<Vec<i64>> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl InteractionCountFetcher for FakeCounts {
    async fn get_counts(&self, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        self.calls.lock().await.push(ids.to_vec());

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.counts.get(id).map(|count| (*id, *count)))
            .collect())
    }
}

#[derive(Default)]
struct FakeSink {
    published: Mutex<Vec<TopNResult>>,
}

#[async_trait]
impl RankingResultSink for FakeSink {
    async fn replace_top_n(&self, result: &TopNResult) -> AppResult<()> {
        self.published.lock().await.push(result.clone());
        Ok(())
    }
}

fn config(top_n: usize, batch_size: usize) -> RankingConfig {
    RankingConfig {
        top_n,
        batch_size,
        window: Duration::days(36_500),
        ..RankingConfig::default()
    }
}

fn engine(
    lister: &Arc<FakeLister>,
    counts: &Arc<FakeCounts>,
    config: RankingConfig,
) -> RankingEngine {
    RankingEngine::new(lister.clone(), counts.clone(), config)
        .unwrap_or_else(|_| unreachable!())
        .with_score_fn(count_score())
}

fn three_page_fixture() -> (Arc<FakeLister>, Arc<FakeCounts>) {
    let lister = Arc::new(FakeLister::with_pages(vec![
        vec![item(1, 1), item(2, 2)],
        vec![item(3, 3), item(4, 4)],
        Vec::new(),
    ]));
    let counts = Arc::new(FakeCounts::with_counts(&[(1, 1), (2, 2), (3, 3), (4, 4)]));
    (lister, counts)
}

#[tokio::test]
async fn pagination_stops_on_short_page_and_fetches_counts_for_every_page() {
    let (lister, counts) = three_page_fixture();
    let engine = engine(&lister, &counts, config(3, 2));

    let result = engine.compute_top_n(now()).await;

    assert!(result.is_ok());
    assert_eq!(lister.calls().await, vec![(0, 2), (2, 2), (4, 2)]);
    assert_eq!(
        counts.calls().await,
        vec![vec![1, 2], vec![3, 4], Vec::new()]
    );
}

#[tokio::test]
async fn top_n_keeps_highest_scores_in_order() {
    let (lister, counts) = three_page_fixture();
    let engine = engine(&lister, &counts, config(3, 2));

    let result = engine
        .compute_top_n(now())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.item_ids, vec![4, 3, 2]);
    assert_eq!(result.computed_at, now());
}

#[tokio::test]
async fn equal_scores_are_ordered_by_update_time_then_id() {
    let lister = Arc::new(FakeLister::with_pages(vec![vec![
        item(10, 1),
        item(12, 1),
        item(11, 2),
    ]]));
    let counts = Arc::new(FakeCounts::with_counts(&[(10, 5), (11, 5), (12, 5)]));
    let engine = engine(&lister, &counts, config(10, 5));

    let first = engine.compute_top_n(now()).await;
    let second = engine.compute_top_n(now()).await;

    let first = first.unwrap_or_else(|_| unreachable!());
    assert_eq!(first.item_ids, vec![12, 10, 11]);
    assert_eq!(second, Ok(first));
}

#[tokio::test]
async fn missing_counts_score_as_zero() {
    let lister = Arc::new(FakeLister::with_pages(vec![vec![item(1, 1), item(2, 1)]]));
    let counts = Arc::new(FakeCounts::with_counts(&[(1, 3)]));
    let engine = engine(&lister, &counts, config(10, 5));

    let result = engine
        .compute_top_n(now())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.item_ids, vec![1, 2]);
}

#[tokio::test]
async fn max_pages_bounds_endless_upstream() {
    let lister = Arc::new(FakeLister {
        endless: true,
        ..FakeLister::default()
    });
    let counts = Arc::new(FakeCounts::default());
    let engine = engine(
        &lister,
        &counts,
        RankingConfig {
            max_pages: 3,
            ..config(2, 4)
        },
    );

    let result = engine.compute_top_n(now()).await;

    assert!(result.is_ok());
    assert_eq!(lister.calls().await, vec![(0, 4), (4, 4), (8, 4)]);
    assert_eq!(counts.calls().await.len(), 3);
}

#[tokio::test]
async fn pagination_stops_after_page_leaving_the_window() {
    let lister = Arc::new(FakeLister::with_pages(vec![
        vec![item(1, 1), item(2, 2)],
        vec![item(3, 30), item(4, 200)],
        vec![item(5, 300), item(6, 400)],
    ]));
    let counts = Arc::new(FakeCounts::with_counts(&[(4, 9), (5, 10)]));
    let engine = engine(
        &lister,
        &counts,
        RankingConfig {
            window: Duration::hours(168),
            ..config(2, 2)
        },
    );

    let result = engine
        .compute_top_n(now())
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(lister.calls().await.len(), 2);
    assert_eq!(result.item_ids.first(), Some(&4));
}

#[tokio::test]
async fn upstream_failures_abort_the_computation() {
    let failing_lister = Arc::new(FakeLister {
        failure: Some(AppError::Unavailable("content store down".to_owned())),
        ..FakeLister::default()
    });
    let counts = Arc::new(FakeCounts::default());
    let result = engine(&failing_lister, &counts, config(3, 2))
        .compute_top_n(now())
        .await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    assert!(counts.calls().await.is_empty());

    let (lister, _) = three_page_fixture();
    let failing_counts = Arc::new(FakeCounts {
        failure: Some(AppError::Unavailable("count store down".to_owned())),
        ..FakeCounts::default()
    });
    let result = engine(&lister, &failing_counts, config(3, 2))
        .compute_top_n(now())
        .await;
    assert!(matches!(result, Err(AppError::Unavailable(_))));
    assert_eq!(lister.calls().await.len(), 1);
}

#[test]
fn invalid_config_is_rejected() {
    let lister = Arc::new(FakeLister::default());
    let counts = Arc::new(FakeCounts::default());

    for invalid in [
        config(0, 2),
        config(3, 0),
        RankingConfig {
            max_pages: 0,
            ..RankingConfig::default()
        },
        RankingConfig {
            window: Duration::zero(),
            ..RankingConfig::default()
        },
    ] {
        let result = RankingEngine::new(lister.clone(), counts.clone(), invalid);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}

#[tokio::test]
async fn service_publishes_computed_ranking() {
    let (lister, counts) = three_page_fixture();
    let sink = Arc::new(FakeSink::default());
    let service = RankingService::new(engine(&lister, &counts, config(3, 2)), sink.clone());

    assert_eq!(service.name(), RANKING_JOB_NAME);
    assert!(service.execute(&JobContext::new()).await.is_ok());

    let published = sink.published.lock().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].item_ids, vec![4, 3, 2]);
}

#[tokio::test]
async fn service_does_not_publish_after_abort_or_failure() {
    let (lister, counts) = three_page_fixture();
    let sink = Arc::new(FakeSink::default());
    let service = RankingService::new(engine(&lister, &counts, config(3, 2)), sink.clone());
    let context = JobContext::new();
    context.cancel();

    let aborted = service.execute(&context).await;
    assert!(matches!(aborted, Err(AppError::Cancelled(_))));

    let failing_lister = Arc::new(FakeLister {
        failure: Some(AppError::Unavailable("content store down".to_owned())),
        ..FakeLister::default()
    });
    let service = RankingService::new(
        engine(&failing_lister, &counts, config(3, 2)),
        sink.clone(),
    );
    let failed = service.execute(&JobContext::new()).await;
    assert!(matches!(failed, Err(AppError::Unavailable(_))));

    assert!(sink.published.lock().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_expiring_mid_fetch_fails_with_timeout_and_publishes_nothing() {
    let lister = Arc::new(FakeLister {
        delay: Some(std::time::Duration::from_secs(5)),
        ..FakeLister::with_pages(vec![vec![item(1, 1), item(2, 2)], Vec::new()])
    });
    let counts = Arc::new(FakeCounts::with_counts(&[(1, 1), (2, 2)]));
    let sink = Arc::new(FakeSink::default());
    let service = RankingService::new(engine(&lister, &counts, config(3, 2)), sink.clone());

    let store = Arc::new(FakeLeaseStore::default());
    let lock = DistributedLock::new(store, "test:lock", "node");
    let runner = JobRunner::new(
        Arc::new(service),
        lock,
        JobRunnerConfig::for_run_timeout(std::time::Duration::from_secs(3)),
    )
    .unwrap_or_else(|_| unreachable!());

    let outcome = runner.run(&JobContext::new()).await;

    assert!(matches!(outcome, Err(AppError::Timeout(_))));
    assert_eq!(lister.calls().await.len(), 1);
    assert!(counts.calls().await.is_empty());

    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    assert!(sink.published.lock().await.is_empty());
}
