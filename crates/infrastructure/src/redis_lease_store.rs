//! Redis-backed lease store for the cluster job lock.

use std::time::Duration;

use async_trait::async_trait;
use hotlist_application::LeaseStore;
use hotlist_core::{AppError, AppResult};
use redis::{AsyncCommands, Script};

const DELETE_IF_MATCHES_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const EXTEND_IF_MATCHES_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('PEXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Redis implementation of the lease store port.
///
/// Keys are used as given; namespacing is the lock's concern.
#[derive(Clone)]
pub struct RedisLeaseStore {
    client: redis::Client,
}

impl RedisLeaseStore {
    /// Creates one store adapter.
    #[must_use]
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn set_if_absent_with_expiry(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl)?)
            .query_async(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to acquire lease: {error}")))?;

        Ok(reply.is_some())
    }

    async fn extend_if_value_matches(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let extended = Script::new(EXTEND_IF_MATCHES_SCRIPT)
            .key(key)
            .arg(expected)
            .arg(ttl_millis(ttl)?)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to extend lease: {error}")))?;

        Ok(extended == 1)
    }

    async fn delete_if_value_matches(&self, key: &str, expected: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let deleted = Script::new(DELETE_IF_MATCHES_SCRIPT)
            .key(key)
            .arg(expected)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to release lease: {error}")))?;

        Ok(deleted == 1)
    }

    async fn get_value(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;

        connection
            .get(key)
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to read lease: {error}")))
    }
}

fn ttl_millis(ttl: Duration) -> AppResult<u64> {
    let millis = u64::try_from(ttl.as_millis())
        .map_err(|_| AppError::Validation("lease ttl is too large".to_owned()))?;

    if millis == 0 {
        return Err(AppError::Validation(
            "lease ttl must be at least one millisecond".to_owned(),
        ));
    }

    Ok(millis)
}
