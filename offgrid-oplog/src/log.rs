//! The append-only mutation log.
//!
//! Ordered by timestamp, deduplicated by timestamp (a record's identity),
//! and never rewritten: losing records stay in the log because a future
//! reconciliation may need to offer them to a peer that has never seen
//! them.

use offgrid_types::{MutationRecord, NodeId, Timestamp};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

/// In-memory ordered view of the mutation log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationLog {
    records: BTreeMap<Timestamp, MutationRecord>,
}

impl MutationLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, keyed by its timestamp.
    ///
    /// Returns false if a record with this identity is already present;
    /// the log is never overwritten.
    pub fn insert(&mut self, record: MutationRecord) -> bool {
        match self.records.entry(record.timestamp) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    /// Returns true if a record with this identity is present.
    #[must_use]
    pub fn contains(&self, ts: &Timestamp) -> bool {
        self.records.contains_key(ts)
    }

    /// Looks up a record by identity.
    #[must_use]
    pub fn get(&self, ts: &Timestamp) -> Option<&MutationRecord> {
        self.records.get(ts)
    }

    /// Number of records in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates records in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = &MutationRecord> {
        self.records.values()
    }

    /// Iterates the record identities in timestamp order.
    pub fn timestamps(&self) -> impl Iterator<Item = &Timestamp> {
        self.records.keys()
    }

    /// Records whose wall-time component falls in `millis`, in order.
    ///
    /// Used to gather the contents of divergent sync buckets.
    #[must_use]
    pub fn records_in_millis(&self, millis: RangeInclusive<u64>) -> Vec<&MutationRecord> {
        let lo = Timestamp::new(*millis.start(), 0, NodeId::from_bytes([0x00; 8]));
        let hi = Timestamp::new(*millis.end(), u16::MAX, NodeId::from_bytes([0xff; 8]));
        self.records.range(lo..=hi).map(|(_, r)| r).collect()
    }
}

impl<'a> IntoIterator for &'a MutationLog {
    type Item = &'a MutationRecord;
    type IntoIter = std::collections::btree_map::Values<'a, Timestamp, MutationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
