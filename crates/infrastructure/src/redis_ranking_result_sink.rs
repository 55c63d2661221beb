//! Redis-backed ranking result sink.

use std::time::Duration;

use async_trait::async_trait;
use hotlist_application::RankingResultSink;
use hotlist_core::{AppError, AppResult};
use hotlist_domain::TopNResult;
use redis::AsyncCommands;

/// Stores the latest ranking as a JSON array of ids with a TTL.
#[derive(Clone)]
pub struct RedisRankingResultSink {
    client: redis::Client,
    key_prefix: String,
    ttl: Duration,
}

impl RedisRankingResultSink {
    /// Creates a sink adapter with a configured Redis client and key prefix.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    fn key(&self) -> String {
        format!("{}:top_n", self.key_prefix)
    }

    fn encode_result(result: &TopNResult) -> AppResult<String> {
        serde_json::to_string(&result.item_ids).map_err(|error| {
            AppError::Internal(format!("failed to encode ranking result: {error}"))
        })
    }
}

#[async_trait]
impl RankingResultSink for RedisRankingResultSink {
    async fn replace_top_n(&self, result: &TopNResult) -> AppResult<()> {
        let ttl_seconds = self.ttl.as_secs().max(1);
        let value = Self::encode_result(result)?;
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to connect to redis: {error}"))
            })?;

        connection
            .set_ex(self.key(), value, ttl_seconds)
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("failed to write ranking result: {error}"))
            })
    }
}
