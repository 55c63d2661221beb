use std::time::Duration;

use async_trait::async_trait;
use hotlist_core::AppResult;

/// Shared key-value store with atomic conditional writes and per-key expiry.
///
/// Every method touches exactly one key. Implementations must make each
/// conditional write atomic with respect to concurrent callers.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Stores `value` under `key` with `ttl` only when the key is absent or
    /// expired. Returns false when another unexpired value exists.
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> AppResult<bool>;

    /// Resets the expiry of `key` to `ttl` only when its value equals `expected`.
    async fn extend_if_value_matches(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> AppResult<bool>;

    /// Deletes `key` only when its value equals `expected`.
    async fn delete_if_value_matches(&self, key: &str, expected: &str) -> AppResult<bool>;

    /// Returns the unexpired value stored under `key`.
    async fn get_value(&self, key: &str) -> AppResult<Option<String>>;
}
