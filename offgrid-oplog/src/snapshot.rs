//! The derived snapshot: current winner of every cell.
//!
//! A per-cell last-writer-wins register map. The winner of a cell is the
//! record with the greatest timestamp under the total order; because a
//! timestamp is a record's identity, true ties cannot occur — re-applying
//! the same record is a no-op, which is what makes merge idempotent.
//!
//! The snapshot is never authoritative: it can always be rebuilt by
//! replaying the log.

use offgrid_types::{CellValue, MutationRecord, RowId, Timestamp, TOMBSTONE_COLUMN};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identity of one cell.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellKey {
    /// Table the cell belongs to.
    pub table: String,
    /// Row the cell belongs to.
    pub row: RowId,
    /// Column name.
    pub column: String,
}

/// Current winner of one cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellState {
    /// The winning value.
    pub value: CellValue,
    /// Timestamp of the winning record.
    pub timestamp: Timestamp,
}

/// One applied change, as handed to the materializer.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChange {
    /// Table the change applies to.
    pub table: String,
    /// Row the change applies to.
    pub row: RowId,
    /// Column that changed.
    pub column: String,
    /// The new winning value.
    pub value: CellValue,
    /// Timestamp of the winning record.
    pub timestamp: Timestamp,
}

/// Materialized view of the log: every cell's current winner.
///
/// Uses ordered maps throughout so two converged replicas hold
/// byte-identical snapshots when serialized. Serialization flattens the
/// map into an ordered entry list, since a composite key cannot be a
/// JSON object key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotState", into = "SnapshotState")]
pub struct Snapshot {
    cells: BTreeMap<CellKey, CellState>,
}

/// The serialized shape of a snapshot.
#[derive(Serialize, Deserialize)]
struct SnapshotState {
    cells: Vec<(CellKey, CellState)>,
}

impl From<SnapshotState> for Snapshot {
    fn from(state: SnapshotState) -> Self {
        Self {
            cells: state.cells.into_iter().collect(),
        }
    }
}

impl From<Snapshot> for SnapshotState {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            cells: snapshot.cells.into_iter().collect(),
        }
    }
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record into the snapshot.
    ///
    /// The record wins iff its timestamp is strictly greater than the
    /// cell's current winner. Returns the resulting change, or `None` if
    /// the record lost (it stays in the log regardless).
    pub fn apply(&mut self, record: &MutationRecord) -> Option<CellChange> {
        let key = CellKey {
            table: record.table.clone(),
            row: record.row,
            column: record.column.clone(),
        };

        let wins = match self.cells.get(&key) {
            Some(current) => record.timestamp > current.timestamp,
            None => true,
        };
        if !wins {
            return None;
        }

        self.cells.insert(
            key,
            CellState {
                value: record.value.clone(),
                timestamp: record.timestamp,
            },
        );

        Some(CellChange {
            table: record.table.clone(),
            row: record.row,
            column: record.column.clone(),
            value: record.value.clone(),
            timestamp: record.timestamp,
        })
    }

    /// Reads a cell's current value.
    #[must_use]
    pub fn get(&self, table: &str, row: RowId, column: &str) -> Option<&CellValue> {
        let key = CellKey {
            table: table.to_string(),
            row,
            column: column.to_string(),
        };
        self.cells.get(&key).map(|state| &state.value)
    }

    /// Reads a cell's winning timestamp.
    #[must_use]
    pub fn winner(&self, table: &str, row: RowId, column: &str) -> Option<Timestamp> {
        let key = CellKey {
            table: table.to_string(),
            row,
            column: column.to_string(),
        };
        self.cells.get(&key).map(|state| state.timestamp)
    }

    /// All cells of one row, in column order.
    #[must_use]
    pub fn row_cells(&self, table: &str, row: RowId) -> BTreeMap<&str, &CellValue> {
        self.cells
            .iter()
            .filter(|(key, _)| key.table == table && key.row == row)
            .map(|(key, state)| (key.column.as_str(), &state.value))
            .collect()
    }

    /// Returns true if the row's tombstone column marks it deleted.
    #[must_use]
    pub fn is_deleted(&self, table: &str, row: RowId) -> bool {
        matches!(
            self.get(table, row, TOMBSTONE_COLUMN),
            Some(CellValue::Integer(n)) if *n != 0
        )
    }

    /// Iterates every cell in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CellKey, &CellState)> {
        self.cells.iter()
    }

    /// Number of cells with a winner.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if no cell has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
