use chrono::{DateTime, Utc};
use hotlist_core::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque value proving which caller holds a lease.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerToken(String);

impl OwnerToken {
    /// Generates a fresh token unique to one acquisition by `holder_id`.
    #[must_use]
    pub fn generate(holder_id: &str) -> Self {
        Self(format!("{holder_id}:{}", Uuid::new_v4()))
    }

    /// Returns the raw token value stored in the lock store.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Time-bounded exclusive claim on a named lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    lock_name: NonEmptyString,
    owner_token: OwnerToken,
    expires_at: DateTime<Utc>,
}

impl Lease {
    /// Creates a lease record for a successful acquisition or extension.
    #[must_use]
    pub fn new(
        lock_name: NonEmptyString,
        owner_token: OwnerToken,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            lock_name,
            owner_token,
            expires_at,
        }
    }

    /// Returns the lock name this lease protects.
    #[must_use]
    pub fn lock_name(&self) -> &str {
        self.lock_name.as_str()
    }

    /// Returns the owner token presented on extend and release.
    #[must_use]
    pub fn owner_token(&self) -> &OwnerToken {
        &self.owner_token
    }

    /// Returns the absolute expiry last confirmed by the lock store.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns the same lease with a new confirmed expiry.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = expires_at;
        self
    }
}
