use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hotlist_application::LeaseStore;
use hotlist_core::{AppError, AppResult};
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct LeaseEntry {
    value: String,
    expires_at: Instant,
}

impl LeaseEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

fn expiry_after(now: Instant, ttl: Duration) -> AppResult<Instant> {
    now.checked_add(ttl)
        .ok_or_else(|| AppError::Validation(format!("lease ttl {ttl:?} is out of range")))
}

/// Process-local lease store for single-node development runs.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    entries: Mutex<HashMap<String, LeaseEntry>>,
}

impl InMemoryLeaseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> AppResult<bool> {
        let now = Instant::now();
        let expires_at = expiry_after(now, ttl)?;
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }

        entries.insert(
            key.to_owned(),
            LeaseEntry {
                value: value.to_owned(),
                expires_at,
            },
        );
        Ok(true)
    }

    async fn extend_if_value_matches(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> AppResult<bool> {
        let now = Instant::now();
        let expires_at = expiry_after(now, ttl)?;
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if entry.is_live(now) && entry.value == expected => {
                entry.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_value_matches(&self, key: &str, expected: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let Some(entry) = entries.get(key) else {
            return Ok(false);
        };

        if !entry.is_live(now) {
            entries.remove(key);
            return Ok(false);
        }

        if entry.value != expected {
            return Ok(false);
        }

        entries.remove(key);
        Ok(true)
    }

    async fn get_value(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}
