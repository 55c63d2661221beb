//! Hotlist ranking worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use hotlist_application::{
    DistributedLock, InteractionCountFetcher, JobRunner, JobRunnerConfig, LeaseStore,
    RankableItemLister, RankingConfig, RankingEngine, RankingResultSink, RankingService,
    Scheduler,
};
use hotlist_core::{AppError, AppResult};
use hotlist_infrastructure::{
    HttpContentLister, HttpInteractionCountFetcher, InMemoryLeaseStore, InMemoryRankingResultSink,
    RedisLeaseStore, RedisRankingResultSink,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOCK_KEY_PREFIX: &str = "hotlist:lock";
const RESULT_KEY_PREFIX: &str = "hotlist:ranking";

#[derive(Debug, Clone)]
struct WorkerConfig {
    redis_url: Option<String>,
    content_api_base_url: String,
    interaction_api_base_url: String,
    interaction_biz: String,
    worker_id: String,
    job_interval: Duration,
    job_timeout: Duration,
    lock_acquire_timeout: Duration,
    ranking: RankingConfig,
    result_ttl: Duration,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let (lease_store, result_sink) = build_stores(&config)?;

    let lister: Arc<dyn RankableItemLister> = Arc::new(HttpContentLister::new(
        http_client.clone(),
        config.content_api_base_url.as_str(),
    ));
    let counts: Arc<dyn InteractionCountFetcher> = Arc::new(HttpInteractionCountFetcher::new(
        http_client,
        config.interaction_api_base_url.as_str(),
        config.interaction_biz.as_str(),
    ));
    let engine = RankingEngine::new(lister, counts, config.ranking)?;
    let ranking_service = RankingService::new(engine, result_sink);

    let lock = DistributedLock::new(lease_store, LOCK_KEY_PREFIX, config.worker_id.as_str());
    let runner_config = JobRunnerConfig {
        acquire_timeout: config.lock_acquire_timeout,
        ..JobRunnerConfig::for_run_timeout(config.job_timeout)
    };
    let ranking_job = JobRunner::new(Arc::new(ranking_service), lock, runner_config)?;

    let mut scheduler = Scheduler::new();
    scheduler.register(Arc::new(ranking_job), config.job_interval)?;
    scheduler.start()?;

    info!(
        worker_id = %config.worker_id,
        content_api_base_url = %config.content_api_base_url,
        interaction_api_base_url = %config.interaction_api_base_url,
        interval_seconds = config.job_interval.as_secs(),
        timeout_seconds = config.job_timeout.as_secs(),
        top_n = config.ranking.top_n,
        "hotlist-worker started"
    );

    let signal = tokio::signal::ctrl_c().await;
    if let Err(error) = signal {
        warn!(error = %error, "failed to listen for shutdown signal, shutting down");
    }

    scheduler.shutdown().await;
    info!(worker_id = %config.worker_id, "hotlist-worker stopped");
    Ok(())
}

fn build_stores(
    config: &WorkerConfig,
) -> AppResult<(Arc<dyn LeaseStore>, Arc<dyn RankingResultSink>)> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        warn!("REDIS_URL is not set, using in-memory lock and result stores for this node only");
        return Ok((
            Arc::new(InMemoryLeaseStore::new()),
            Arc::new(InMemoryRankingResultSink::new()),
        ));
    };

    let client = redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    Ok((
        Arc::new(RedisLeaseStore::new(client.clone())),
        Arc::new(RedisRankingResultSink::new(
            client,
            RESULT_KEY_PREFIX,
            config.result_ttl,
        )),
    ))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let redis_url = optional_env("REDIS_URL");
        let content_api_base_url = optional_env("CONTENT_API_BASE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8080".to_owned());
        let interaction_api_base_url = optional_env("INTERACTION_API_BASE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8081".to_owned());
        let interaction_biz =
            optional_env("INTERACTION_BIZ").unwrap_or_else(|| "article".to_owned());
        let worker_id = optional_env("WORKER_ID")
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));

        let interval_seconds = parse_positive_u64("RANKING_JOB_INTERVAL_SECONDS", 180)?;
        let timeout_seconds = parse_positive_u64("RANKING_JOB_TIMEOUT_SECONDS", 60)?;
        let acquire_timeout_ms = parse_positive_u64("RANKING_LOCK_ACQUIRE_TIMEOUT_MS", 1000)?;
        let top_n = parse_positive_usize("RANKING_TOP_N", 100)?;
        let batch_size = parse_positive_usize("RANKING_BATCH_SIZE", 100)?;
        let max_pages = parse_positive_usize("RANKING_MAX_PAGES", 1000)?;
        let window_hours = parse_positive_u64("RANKING_WINDOW_HOURS", 168)?;
        let result_ttl_seconds = parse_positive_u64("RANKING_RESULT_TTL_SECONDS", 180)?;

        let window_hours = i64::try_from(window_hours).map_err(|_| {
            AppError::Validation("RANKING_WINDOW_HOURS is out of range".to_owned())
        })?;
        let window = chrono::Duration::try_hours(window_hours).ok_or_else(|| {
            AppError::Validation("RANKING_WINDOW_HOURS is out of range".to_owned())
        })?;

        Ok(Self {
            redis_url,
            content_api_base_url,
            interaction_api_base_url,
            interaction_biz,
            worker_id,
            job_interval: Duration::from_secs(interval_seconds),
            job_timeout: Duration::from_secs(timeout_seconds),
            lock_acquire_timeout: Duration::from_millis(acquire_timeout_ms),
            ranking: RankingConfig {
                top_n,
                batch_size,
                max_pages,
                window,
            },
            result_ttl: Duration::from_secs(result_ttl_seconds),
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_positive_usize(name: &str, default: usize) -> AppResult<usize> {
    let value = match env::var(name) {
        Ok(value) => value.parse::<usize>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        Err(_) => default,
    };

    if value == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}

fn parse_positive_u64(name: &str, default: u64) -> AppResult<u64> {
    let value = match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        })?,
        Err(_) => default,
    };

    if value == 0 {
        return Err(AppError::Validation(format!(
            "{name} must be greater than zero"
        )));
    }

    Ok(value)
}
