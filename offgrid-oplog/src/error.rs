//! Error types for the log and merge layer.

use offgrid_types::ClockError;
use thiserror::Error;

/// Result type for log and merge operations.
pub type OplogResult<T> = Result<T, OplogError>;

/// Errors that can occur in log and merge operations.
#[derive(Debug, Error)]
pub enum OplogError {
    /// A record failed shape validation. Rejected before log insertion.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A record's signature did not verify against the owner key.
    /// Rejected before log insertion.
    #[error("record signature mismatch")]
    SignatureMismatch,

    /// A record's timestamp violated the clock's drift bound.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// The persistence layer failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Persisted cached state was unreadable. Recovered by replaying the
    /// log to rebuild the snapshot and tree.
    #[error("corrupt persisted state: {0}")]
    Corruption(String),

    /// Cryptographic failure outside signature verification.
    #[error(transparent)]
    Crypto(#[from] offgrid_crypto::CryptoError),

    /// Encoding failure.
    #[error(transparent)]
    Types(#[from] offgrid_types::Error),
}

impl From<rusqlite::Error> for OplogError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
