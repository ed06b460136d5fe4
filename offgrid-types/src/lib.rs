//! Core type definitions for Offgrid.
//!
//! This crate defines the fundamental, schema-agnostic types used throughout
//! the replication core:
//! - Replica and owner identifiers, row identifiers (UUID v7)
//! - Hybrid Logical Clock timestamps and the clock state machine
//! - Tagged cell values and signed per-cell mutation records
//!
//! Everything schema-specific (table layouts, query shapes, migrations)
//! belongs to the embedding application, not here.

mod clock;
mod ids;
mod mutation;
mod timestamp;
mod value;

pub use clock::{ClockError, HlcClock, DEFAULT_MAX_DRIFT_MILLIS};
pub use ids::{NodeId, OwnerId, RowId};
pub use mutation::{CellWrite, MutationRecord, TOMBSTONE_COLUMN};
pub use timestamp::Timestamp;
pub use value::CellValue;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}
