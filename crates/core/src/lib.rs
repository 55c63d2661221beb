//! Shared primitives for all Rust crates in Hotlist.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across Hotlist crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl std::fmt::Display for NonEmptyString {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller presented an owner token that no longer holds the resource.
    #[error("not owner: {0}")]
    NotOwner(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A singleton background task was started twice.
    #[error("already running: {0}")]
    AlreadyRunning(String),

    /// Exclusive ownership was lost while protected work was in flight.
    #[error("lease lost: {0}")]
    LeaseLost(String),

    /// The caller cancelled the run before it completed.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A bounded operation did not complete before its deadline.
    #[error("timeout: {0}")]
    Timeout(String),

    /// A backing store or upstream service could not be reached.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns true when the error proves that a lease is no longer held.
    #[must_use]
    pub fn is_ownership_loss(&self) -> bool {
        matches!(self, Self::NotOwner(_) | Self::NotFound(_))
    }
}
