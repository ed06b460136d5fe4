//! Error types for the materializer.

use thiserror::Error;

/// Result type for materializer operations.
pub type MaterializeResult<T> = Result<T, MaterializeError>;

/// Errors that can occur while materializing state.
#[derive(Debug, Error)]
pub enum MaterializeError {
    /// The storage collaborator failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A registered table schema is unusable.
    #[error("invalid schema: {0}")]
    Schema(String),
}

impl From<rusqlite::Error> for MaterializeError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
