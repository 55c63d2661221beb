use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use hotlist_application::{InteractionCountFetcher, RankableItemLister};
use hotlist_core::{AppError, AppResult};
use hotlist_domain::ContentItem;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct PublishedPageResponse {
    items: Vec<ContentItem>,
}

#[derive(Debug, Serialize)]
struct InteractionBatchRequest<'a> {
    biz: &'a str,
    ids: &'a [i64],
}

#[derive(Debug, Deserialize)]
struct InteractionBatchResponse {
    #[serde(default)]
    counts: HashMap<i64, i64>,
}

/// Content lister backed by the content service's published-articles API.
pub struct HttpContentLister {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpContentLister {
    /// Creates a lister for the content service at `base_url`.
    #[must_use]
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: trim_base_url(base_url.into()),
        }
    }

    fn page_url(&self, cursor_time: DateTime<Utc>, offset: usize, limit: usize) -> String {
        format!(
            "{}/articles/published?before={}&offset={offset}&limit={limit}",
            self.base_url,
            cursor_time.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

#[async_trait]
impl RankableItemLister for HttpContentLister {
    async fn list_page(
        &self,
        cursor_time: DateTime<Utc>,
        offset: usize,
        limit: usize,
    ) -> AppResult<Vec<ContentItem>> {
        let url = self.page_url(cursor_time, offset, limit);
        let response = self
            .http_client
            .get(url.as_str())
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("content service request failed: {error}"))
            })?;

        let page: PublishedPageResponse = decode_response(response, "content service").await?;
        debug!(offset, limit, returned = page.items.len(), "content page fetched");
        Ok(page.items)
    }
}

/// Interaction-count fetcher backed by the interaction service's batch API.
pub struct HttpInteractionCountFetcher {
    http_client: reqwest::Client,
    base_url: String,
    biz: String,
}

impl HttpInteractionCountFetcher {
    /// Creates a fetcher for interactions of business type `biz`.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        base_url: impl Into<String>,
        biz: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            base_url: trim_base_url(base_url.into()),
            biz: biz.into(),
        }
    }
}

#[async_trait]
impl InteractionCountFetcher for HttpInteractionCountFetcher {
    async fn get_counts(&self, ids: &[i64]) -> AppResult<HashMap<i64, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response = self
            .http_client
            .post(format!("{}/interactions/batch", self.base_url))
            .json(&InteractionBatchRequest {
                biz: self.biz.as_str(),
                ids,
            })
            .send()
            .await
            .map_err(|error| {
                AppError::Unavailable(format!("interaction service request failed: {error}"))
            })?;

        let batch: InteractionBatchResponse =
            decode_response(response, "interaction service").await?;
        Ok(batch.counts)
    }
}

async fn decode_response<T>(response: reqwest::Response, service: &str) -> AppResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<response body unavailable>".to_owned());
        return Err(AppError::Unavailable(format!(
            "{service} responded with status {status}: {body}"
        )));
    }

    response
        .json::<T>()
        .await
        .map_err(|error| AppError::Internal(format!("{service} returned invalid body: {error}")))
}

fn trim_base_url(base_url: String) -> String {
    base_url.trim_end_matches('/').to_owned()
}
