//! Mutation records — the unit of replication.
//!
//! A mutation assigns one value to one cell. Row creation is implicit on
//! the first mutation that references a new row id; deletion is a write
//! to the reserved marker column, never a removal from the log.

use crate::{CellValue, Result, RowId, Timestamp};
use serde::{Deserialize, Serialize};

/// Reserved column name whose presence marks a row as deleted.
///
/// Writing `Integer(1)` to this column tombstones the row; the log keeps
/// the full history of the row's other cells.
pub const TOMBSTONE_COLUMN: &str = "_deleted";

/// One recorded write to a single cell.
///
/// Records are immutable once created and totally ordered by their
/// timestamp, which is also their global identity: a replica never issues
/// the same timestamp twice, so two records with equal timestamps are the
/// same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Table the cell belongs to.
    pub table: String,

    /// Row the cell belongs to.
    pub row: RowId,

    /// Column name within the table.
    pub column: String,

    /// The assigned value.
    pub value: CellValue,

    /// When the write was issued; the record's identity.
    pub timestamp: Timestamp,

    /// Ed25519 signature over [`signing_bytes`](Self::signing_bytes),
    /// issued with the owner's signing key.
    #[serde(default)]
    pub signature: Vec<u8>,
}

/// Borrowed view serialized to produce the canonical signing bytes.
/// Field order is part of the wire contract.
#[derive(Serialize)]
struct SigningView<'a> {
    table: &'a str,
    row: RowId,
    column: &'a str,
    value: &'a CellValue,
    timestamp: Timestamp,
}

impl MutationRecord {
    /// Creates an unsigned record. The signature is attached by the owner
    /// context before the record enters the log.
    #[must_use]
    pub fn new(
        table: impl Into<String>,
        row: RowId,
        column: impl Into<String>,
        value: CellValue,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            table: table.into(),
            row,
            column: column.into(),
            value,
            timestamp,
            signature: Vec::new(),
        }
    }

    /// Attaches a signature.
    #[must_use]
    pub fn with_signature(mut self, signature: Vec<u8>) -> Self {
        self.signature = signature;
        self
    }

    /// Canonical bytes covered by the record signature.
    pub fn signing_bytes(&self) -> Result<Vec<u8>> {
        let view = SigningView {
            table: &self.table,
            row: self.row,
            column: &self.column,
            value: &self.value,
            timestamp: self.timestamp,
        };
        Ok(serde_json::to_vec(&view)?)
    }

    /// Returns true if this record tombstones its row.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.column == TOMBSTONE_COLUMN
    }

    /// The cell this record targets, as a borrowed key.
    #[must_use]
    pub fn cell(&self) -> (&str, RowId, &str) {
        (&self.table, self.row, &self.column)
    }
}

/// One not-yet-stamped local write, as submitted by the embedding
/// application. The replica assigns the timestamp and signature.
#[derive(Debug, Clone, PartialEq)]
pub struct CellWrite {
    /// Target table.
    pub table: String,
    /// Target row.
    pub row: RowId,
    /// Target column.
    pub column: String,
    /// Value to assign.
    pub value: CellValue,
}

impl CellWrite {
    /// A write assigning `value` to one cell.
    #[must_use]
    pub fn set(
        table: impl Into<String>,
        row: RowId,
        column: impl Into<String>,
        value: impl Into<CellValue>,
    ) -> Self {
        Self {
            table: table.into(),
            row,
            column: column.into(),
            value: value.into(),
        }
    }

    /// A write tombstoning an entire row.
    #[must_use]
    pub fn delete(table: impl Into<String>, row: RowId) -> Self {
        Self {
            table: table.into(),
            row,
            column: TOMBSTONE_COLUMN.to_string(),
            value: CellValue::Integer(1),
        }
    }
}
