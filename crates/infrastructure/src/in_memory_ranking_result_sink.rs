use async_trait::async_trait;
use hotlist_application::RankingResultSink;
use hotlist_core::AppResult;
use hotlist_domain::TopNResult;
use tokio::sync::RwLock;

/// In-memory sink keeping only the latest published ranking.
#[derive(Default)]
pub struct InMemoryRankingResultSink {
    latest: RwLock<Option<TopNResult>>,
}

impl InMemoryRankingResultSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the most recently published ranking.
    pub async fn latest(&self) -> Option<TopNResult> {
        self.latest.read().await.clone()
    }
}

#[async_trait]
impl RankingResultSink for InMemoryRankingResultSink {
    async fn replace_top_n(&self, result: &TopNResult) -> AppResult<()> {
        *self.latest.write().await = Some(result.clone());
        Ok(())
    }
}
