use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hotlist_core::{AppError, AppResult, NonEmptyString};
use hotlist_domain::{Lease, OwnerToken};

use crate::lease_ports::LeaseStore;

/// Leased mutual-exclusion primitive over a shared [`LeaseStore`].
#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn LeaseStore>,
    key_prefix: String,
    holder_id: String,
}

impl DistributedLock {
    /// Creates a lock client for one node identity.
    #[must_use]
    pub fn new(
        store: Arc<dyn LeaseStore>,
        key_prefix: impl Into<String>,
        holder_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            key_prefix: key_prefix.into(),
            holder_id: holder_id.into(),
        }
    }

    /// Returns the node identity embedded in owner tokens.
    #[must_use]
    pub fn holder_id(&self) -> &str {
        self.holder_id.as_str()
    }

    /// Returns the store key used for `lock_name`.
    #[must_use]
    pub fn key_for(&self, lock_name: &str) -> String {
        format!("{}:{lock_name}", self.key_prefix)
    }

    /// Creates the lease only if absent or expired.
    ///
    /// Returns `Ok(None)` when another unexpired lease exists.
    pub async fn try_acquire(
        &self,
        lock_name: &str,
        lease_duration: Duration,
    ) -> AppResult<Option<Lease>> {
        let lock_name = NonEmptyString::new(lock_name)?;
        validate_duration(lease_duration)?;

        let expires_at = expiry_from_now(lease_duration)?;
        let token = OwnerToken::generate(self.holder_id.as_str());
        let acquired = self
            .store
            .set_if_absent_with_expiry(
                self.key_for(lock_name.as_str()).as_str(),
                token.as_str(),
                lease_duration,
            )
            .await?;

        if !acquired {
            return Ok(None);
        }

        Ok(Some(Lease::new(lock_name, token, expires_at)))
    }

    /// Extends a lease still owned by `lease`'s token.
    ///
    /// Fails with `NotOwner` when another party holds the lock and with
    /// `NotFound` when the lease vanished.
    pub async fn extend(&self, lease: &Lease, new_duration: Duration) -> AppResult<Lease> {
        validate_duration(new_duration)?;
        let expires_at = expiry_from_now(new_duration)?;

        let key = self.key_for(lease.lock_name());
        let extended = self
            .store
            .extend_if_value_matches(key.as_str(), lease.owner_token().as_str(), new_duration)
            .await?;

        if extended {
            return Ok(lease.clone().with_expiry(expires_at));
        }

        Err(self.ownership_error(key.as_str(), lease).await)
    }

    /// Deletes a lease owned by `lease`'s token.
    ///
    /// Succeeds without effect when the lease already expired.
    pub async fn release(&self, lease: &Lease) -> AppResult<()> {
        let key = self.key_for(lease.lock_name());
        let deleted = self
            .store
            .delete_if_value_matches(key.as_str(), lease.owner_token().as_str())
            .await?;

        if deleted {
            return Ok(());
        }

        match self.store.get_value(key.as_str()).await? {
            None => Ok(()),
            Some(current) if current == lease.owner_token().as_str() => Err(AppError::Internal(
                format!("lock '{}' release did not take effect", lease.lock_name()),
            )),
            Some(_) => Err(AppError::NotOwner(format!(
                "lock '{}' is held by another owner",
                lease.lock_name()
            ))),
        }
    }

    async fn ownership_error(&self, key: &str, lease: &Lease) -> AppError {
        match self.store.get_value(key).await {
            Ok(None) => AppError::NotFound(format!(
                "lock '{}' expired before it was extended",
                lease.lock_name()
            )),
            Ok(Some(current)) if current == lease.owner_token().as_str() => AppError::Internal(
                format!("lock '{}' extension did not take effect", lease.lock_name()),
            ),
            Ok(Some(_)) => AppError::NotOwner(format!(
                "lock '{}' is held by another owner",
                lease.lock_name()
            )),
            Err(error) => AppError::NotOwner(format!(
                "lock '{}' could not be extended and its holder is unknown: {error}",
                lease.lock_name()
            )),
        }
    }
}

fn validate_duration(duration: Duration) -> AppResult<()> {
    if duration.as_millis() == 0 {
        return Err(AppError::Validation(
            "lease duration must be at least one millisecond".to_owned(),
        ));
    }

    Ok(())
}

fn expiry_from_now(duration: Duration) -> AppResult<chrono::DateTime<Utc>> {
    let duration = chrono::Duration::from_std(duration)
        .map_err(|error| AppError::Validation(format!("lease duration out of range: {error}")))?;

    Utc::now()
        .checked_add_signed(duration)
        .ok_or_else(|| AppError::Validation("lease expiry out of range".to_owned()))
}
