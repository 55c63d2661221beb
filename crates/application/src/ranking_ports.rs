use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hotlist_core::AppResult;
use hotlist_domain::{ContentItem, TopNResult};

/// Content store port returning published items newest first.
#[async_trait]
pub trait RankableItemLister: Send + Sync {
    /// Lists up to `limit` items updated at or before `cursor_time`, skipping
    /// the first `offset` of them, ordered by update time descending.
    async fn list_page(
        &self,
        cursor_time: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> AppResult<Vec<ContentItem>>;
}

/// Interaction-count store port.
#[async_trait]
pub trait InteractionCountFetcher: Send + Sync {
    /// Returns counts for the requested ids. Ids without interactions may be
    /// absent from the map. An empty id list yields an empty map.
    async fn get_counts(&self, ids: &[i64]) -> AppResult<HashMap<i64, i64>>;
}

/// Write path for a computed ranking, consumed by read-path caches.
#[async_trait]
pub trait RankingResultSink: Send + Sync {
    /// Replaces the published ranking with `result`.
    async fn replace_top_n(&self, result: &TopNResult) -> AppResult<()>;
}
