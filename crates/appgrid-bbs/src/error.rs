//! Error types for store operations.

use thiserror::Error;

/// Result type alias for store operations.
pub type BbsResult<T> = Result<T, BbsError>;

/// Errors surfaced by store adapters.
///
/// Nothing here is fatal to the reconciler: reads abort the current
/// change, writes are logged and skipped, watch errors trigger a
/// re-subscription.
#[derive(Debug, Clone, Error)]
pub enum BbsError {
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("store write failed: {0}")]
    WriteFailed(String),

    #[error("desired watch failed: {0}")]
    WatchClosed(String),

    #[error("failed to deserialize store payload: {0}")]
    Deserialize(String),
}
