use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use hotlist_core::{AppError, AppResult};
use tokio::sync::Mutex;
use tokio::time::Instant;

struct FakeEntry {
    value: String,
    expires_at: Instant,
}

/// Lease store fake driven by the tokio clock, with failure injection.
#[derive(Default)]
pub(crate) struct FakeLeaseStore {
    entries: Mutex<HashMap<String, FakeEntry>>,
    unavailable: AtomicBool,
    acquire_calls: AtomicUsize,
}

impl FakeLeaseStore {
    pub(crate) fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub(crate) fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub(crate) async fn expires_at(&self, key: &str) -> Option<Instant> {
        self.entries
            .lock()
            .await
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.expires_at)
    }

    pub(crate) async fn value(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .await
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Simulates an operator or another node wiping the lease.
    pub(crate) async fn force_delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Simulates another party taking the lease over.
    pub(crate) async fn force_set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.lock().await.insert(
            key.to_owned(),
            FakeEntry {
                value: value.to_owned(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn check_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Unavailable("fake lease store is down".to_owned()));
        }

        Ok(())
    }
}

#[async_trait]
impl crate::LeaseStore for FakeLeaseStore {
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> AppResult<bool> {
        self.acquire_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries.get(key).is_some_and(|entry| entry.expires_at > now) {
            return Ok(false);
        }

        entries.insert(
            key.to_owned(),
            FakeEntry {
                value: value.to_owned(),
                expires_at: now + ttl,
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
        self.check_available()?;

        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(entry) if entry.expires_at > now && entry.value == expected => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_value_matches(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.check_available()?;

        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if entries
            .get(key)
            .is_some_and(|entry| entry.expires_at > now && entry.value == expected)
        {
            entries.remove(key);
            return Ok(true);
        }

        Ok(false)
    }

    async fn get_value(&self, key: &str) -> AppResult<Option<String>> {
        self.check_available()?;
        Ok(self.value(key).await)
    }
}

/// Shared counters observed across every node running a [`SleepyWork`].
#[derive(Default)]
pub(crate) struct WorkProbe {
    started: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    completed_by: std::sync::Mutex<Vec<String>>,
}

impl WorkProbe {
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn completed_by(&self) -> Vec<String> {
        self.completed_by
            .lock()
            .map(|nodes| nodes.clone())
            .unwrap_or_default()
    }
}

struct InFlight<'a>(&'a WorkProbe);

impl<'a> InFlight<'a> {
    fn enter(probe: &'a WorkProbe) -> Self {
        let now = probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(probe)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Unit of work that sleeps, then records completion unless aborted.
pub(crate) struct SleepyWork {
    node: String,
    duration: Duration,
    probe: std::sync::Arc<WorkProbe>,
    failure: Option<AppError>,
}

impl SleepyWork {
    pub(crate) fn new(node: &str, duration: Duration, probe: std::sync::Arc<WorkProbe>) -> Self {
        Self {
            node: node.to_owned(),
            duration,
            probe,
            failure: None,
        }
    }

    pub(crate) fn failing(mut self, failure: AppError) -> Self {
        self.failure = Some(failure);
        self
    }
}

#[async_trait]
impl crate::JobWork for SleepyWork {
    fn name(&self) -> &str {
        "ranking_job"
    }

    async fn execute(&self, context: &crate::JobContext) -> AppResult<()> {
        self.probe.started.fetch_add(1, Ordering::SeqCst);
        let _in_flight = InFlight::enter(&self.probe);

        tokio::time::sleep(self.duration).await;
        context.ensure_active()?;

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        self.probe.completed.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut nodes) = self.probe.completed_by.lock() {
            nodes.push(self.node.clone());
        }
        Ok(())
    }
}
