//! Error types for coordination store operations.

use thiserror::Error;

/// Errors surfaced by a [`CoordinationStore`](super::CoordinationStore)
/// implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The requested key does not exist.
    #[error("key '{key}' not found")]
    NotFound {
        /// The key that was requested.
        key: String,
    },

    /// A compare-and-swap write found a value other than the expected one.
    #[error("compare-and-swap failed for key '{key}': expected {expected:?}, found {actual:?}")]
    CompareAndSwapFailed {
        /// The key the swap targeted.
        key: String,
        /// The value the writer expected to find (`None` = key absent).
        expected: Option<String>,
        /// The value actually present (`None` = key absent).
        actual: Option<String>,
    },

    /// The store could not serve the request; the operation may be retried.
    #[error("coordination store unavailable: {reason}")]
    Unavailable {
        /// Human-readable description of the transient failure.
        reason: String,
    },

    /// The store has been shut down and will not serve further requests.
    #[error("coordination store is shut down")]
    Closed,

    /// The watcher table is full; no further subscriptions are accepted.
    #[error("watch subscription limit of {limit} reached")]
    TooManyWatchers {
        /// The fixed subscription limit.
        limit: usize,
    },
}

impl StoreError {
    /// Whether a write that failed with this error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
