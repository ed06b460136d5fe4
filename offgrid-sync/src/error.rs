//! Error types for the sync layer.

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
///
/// Only sync-specific calls surface these; local reads and writes never
/// fail because of remote conditions.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transient network failure, surfaced only after retries exhausted.
    #[error("network error: {0}")]
    Network(String),

    /// A relay call exceeded its timeout, retries included.
    #[error("operation timed out")]
    Timeout,

    /// The relay rejected our identity or signature.
    #[error("relay authentication failed: {0}")]
    Auth(String),

    /// The remote spoke a shape we do not understand.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Local log/merge failure during a round.
    #[error(transparent)]
    Oplog(#[from] offgrid_oplog::OplogError),

    /// Local crypto failure while sealing outgoing batches.
    #[error(transparent)]
    Crypto(#[from] offgrid_crypto::CryptoError),
}

impl SyncError {
    /// Whether retrying the same call can plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout)
    }
}
