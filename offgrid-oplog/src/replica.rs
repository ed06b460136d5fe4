//! The replica: single-writer state machine tying clock, log, snapshot,
//! and tree together for one dataset on one device.

use crate::error::{OplogError, OplogResult};
use crate::log::MutationLog;
use crate::snapshot::{CellChange, Snapshot};
use crate::store::LogStore;
use offgrid_crypto::{Owner, SIGNATURE_LEN};
use offgrid_merkle::{BucketRange, MerkleConfig, MerkleTree};
use offgrid_types::{CellWrite, HlcClock, MutationRecord, NodeId};
use tracing::{debug, info, warn};

/// Longest accepted table or column name.
const MAX_NAME_LEN: usize = 255;

/// Explicit confirmation required to erase a replica.
///
/// Passing this is the caller's acknowledgement that without the recovery
/// phrase the wiped data cannot be brought back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WipeConfirmation {
    /// Erase the log, snapshot, tree, clock, and persisted state.
    EraseLocalData,
}

/// Result of committing local writes.
#[derive(Debug, Clone)]
pub struct LocalCommit {
    /// The signed records appended to the log, in issue order.
    pub records: Vec<MutationRecord>,
    /// The snapshot changes the writes produced.
    pub changes: Vec<CellChange>,
}

/// Result of merging a batch of remote records.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// Records newly inserted into the log.
    pub applied: usize,
    /// Records already present (idempotent re-delivery).
    pub duplicates: usize,
    /// Records rejected before log insertion (malformed, bad signature,
    /// or drift violation).
    pub rejected: usize,
    /// Snapshot changes produced by the winning records.
    pub changes: Vec<CellChange>,
}

/// One device's replica of one owner's dataset.
///
/// All mutation goes through `&mut self`: the replica is single-writer by
/// construction, which is what keeps timestamp issuance monotonic and the
/// tree consistent with the log.
pub struct Replica {
    owner: Owner,
    clock: HlcClock,
    log: MutationLog,
    snapshot: Snapshot,
    merkle: MerkleTree,
    store: Option<LogStore>,
}

impl Replica {
    /// Creates an ephemeral replica with no persistence.
    #[must_use]
    pub fn in_memory(owner: Owner) -> Self {
        Self::in_memory_with_config(owner, MerkleConfig::default())
    }

    /// Creates an ephemeral replica with a custom tree granularity.
    #[must_use]
    pub fn in_memory_with_config(owner: Owner, config: MerkleConfig) -> Self {
        let node = NodeId::random();
        Self {
            owner,
            clock: HlcClock::new(node),
            log: MutationLog::new(),
            snapshot: Snapshot::new(),
            // A zero bucket width falls back to the default granularity.
            merkle: MerkleTree::with_config(config).unwrap_or_default(),
            store: None,
        }
    }

    /// Opens a persisted replica, replaying the stored log.
    ///
    /// The log is the only authority: the snapshot is always rebuilt by
    /// replay, and the cached tree is used only when it matches the log,
    /// so an unreadable or stale cache heals itself here.
    pub fn open(owner: Owner, store: LogStore) -> OplogResult<Self> {
        let node = match store.load_node_id()? {
            Some(node) => node,
            None => {
                let node = NodeId::random();
                store.save_node_id(&node)?;
                node
            }
        };

        let clock = match store.load_clock()? {
            Some(last) => HlcClock::with_last(node, last),
            None => HlcClock::new(node),
        };

        let records = store.load_records()?;
        let mut log = MutationLog::new();
        let mut snapshot = Snapshot::new();
        for record in &records {
            log.insert(record.clone());
            snapshot.apply(record);
        }

        let merkle = match store.load_merkle() {
            Ok(Some(tree)) if tree.record_count() as usize == log.len() => tree,
            Ok(_) => Self::rebuilt_tree(MerkleConfig::default(), &log)?,
            Err(OplogError::Corruption(reason)) => {
                warn!("merkle cache unreadable ({reason}), rebuilding from log");
                Self::rebuilt_tree(MerkleConfig::default(), &log)?
            }
            Err(e) => return Err(e),
        };

        info!(
            records = log.len(),
            node = %node,
            "opened replica"
        );

        Ok(Self {
            owner,
            clock,
            log,
            snapshot,
            merkle,
            store: Some(store),
        })
    }

    fn rebuilt_tree(config: MerkleConfig, log: &MutationLog) -> OplogResult<MerkleTree> {
        MerkleTree::rebuild_from(config, log.timestamps().copied())
            .map_err(|e| OplogError::Corruption(e.to_string()))
    }

    /// The owner identity this replica belongs to.
    #[must_use]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// This replica's node id.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.clock.node()
    }

    /// The clock, for inspection.
    #[must_use]
    pub fn clock(&self) -> &HlcClock {
        &self.clock
    }

    /// The append-only log.
    #[must_use]
    pub fn log(&self) -> &MutationLog {
        &self.log
    }

    /// The derived snapshot of current cell winners.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The synchronization tree.
    pub fn merkle(&mut self) -> &mut MerkleTree {
        &mut self.merkle
    }

    // ── Local writes ─────────────────────────────────────────────

    /// Stamps, signs, logs, and merges a batch of local writes.
    pub fn apply_local(&mut self, writes: Vec<CellWrite>) -> OplogResult<LocalCommit> {
        let mut records = Vec::with_capacity(writes.len());
        let mut changes = Vec::new();

        for write in writes {
            validate_names(&write.table, &write.column)?;

            let ts = self.clock.next();
            let record =
                MutationRecord::new(write.table, write.row, write.column, write.value, ts);
            let bytes = record.signing_bytes()?;
            let record = record.with_signature(self.owner.sign(&bytes).to_bytes().to_vec());

            self.log.insert(record.clone());
            self.merkle.insert(&ts);
            if let Some(store) = &self.store {
                store.append(&record)?;
                store.save_clock(&self.clock.last())?;
            }
            if let Some(change) = self.snapshot.apply(&record) {
                changes.push(change);
            }
            records.push(record);
        }

        debug!(count = records.len(), "committed local writes");
        Ok(LocalCommit { records, changes })
    }

    // ── Remote merges ────────────────────────────────────────────

    /// Validates and merges one remote record.
    ///
    /// Malformed records, bad signatures, and drift violations are
    /// rejected before log insertion. Returns the snapshot change if the
    /// record won its cell, `None` if it lost or was already present.
    pub fn ingest_record(&mut self, record: MutationRecord) -> OplogResult<Option<CellChange>> {
        validate_names(&record.table, &record.column)?;
        if record.signature.len() != SIGNATURE_LEN {
            return Err(OplogError::MalformedRecord(format!(
                "signature must be {SIGNATURE_LEN} bytes, got {}",
                record.signature.len()
            )));
        }

        let bytes = record.signing_bytes()?;
        self.owner
            .verifying_key()
            .verify_bytes(&bytes, &record.signature)
            .map_err(|_| OplogError::SignatureMismatch)?;

        if self.log.contains(&record.timestamp) {
            return Ok(None);
        }

        self.clock.observe(&record.timestamp)?;
        self.log.insert(record.clone());
        self.merkle.insert(&record.timestamp);
        if let Some(store) = &self.store {
            store.append(&record)?;
            store.save_clock(&self.clock.last())?;
        }

        Ok(self.snapshot.apply(&record))
    }

    /// Merges a batch of remote records, isolating per-record failures.
    ///
    /// Invalid records are dropped and counted; storage failures abort,
    /// since they are local faults rather than bad input.
    pub fn apply_remote(
        &mut self,
        records: impl IntoIterator<Item = MutationRecord>,
    ) -> OplogResult<MergeOutcome> {
        let mut outcome = MergeOutcome::default();

        for record in records {
            if self.log.contains(&record.timestamp) {
                outcome.duplicates += 1;
                continue;
            }
            let ts = record.timestamp;
            match self.ingest_record(record) {
                Ok(change) => {
                    outcome.applied += 1;
                    outcome.changes.extend(change);
                }
                Err(e @ (OplogError::Storage(_) | OplogError::Corruption(_))) => return Err(e),
                Err(e) => {
                    warn!(timestamp = %ts, "rejected remote record: {e}");
                    outcome.rejected += 1;
                }
            }
        }

        debug!(
            applied = outcome.applied,
            duplicates = outcome.duplicates,
            rejected = outcome.rejected,
            "merged remote batch"
        );
        Ok(outcome)
    }

    // ── Sync support ─────────────────────────────────────────────

    /// Clones the records whose buckets fall in the given divergent
    /// ranges, for sealing and exchange.
    #[must_use]
    pub fn records_in_buckets(&self, ranges: &[BucketRange]) -> Vec<MutationRecord> {
        let width = self.merkle.config().bucket_width_ms;
        let mut records = Vec::new();
        for range in ranges {
            let start = range.start.saturating_mul(width);
            let end = range
                .end
                .saturating_mul(width)
                .saturating_add(width - 1);
            records.extend(self.log.records_in_millis(start..=end).into_iter().cloned());
        }
        records
    }

    // ── Persistence and lifecycle ────────────────────────────────

    /// Flushes the tree and clock mark to the store.
    ///
    /// Records are persisted as they are appended; this saves the derived
    /// state so the next open can skip the rebuild.
    pub fn persist_state(&mut self) -> OplogResult<()> {
        if let Some(store) = &self.store {
            store.save_merkle(&self.merkle)?;
            store.save_clock(&self.clock.last())?;
        }
        Ok(())
    }

    /// Rebuilds the snapshot and tree by replaying the log.
    pub fn rebuild(&mut self) -> OplogResult<()> {
        let mut snapshot = Snapshot::new();
        for record in self.log.iter() {
            snapshot.apply(record);
        }
        self.snapshot = snapshot;
        self.merkle = Self::rebuilt_tree(self.merkle.config(), &self.log)?;
        info!(records = self.log.len(), "rebuilt derived state from log");
        Ok(())
    }

    /// Irreversibly erases this replica's local data.
    ///
    /// The dataset can only be recovered by restoring the recovery phrase
    /// and re-syncing from the relay or another replica.
    pub fn reset(&mut self, confirmation: WipeConfirmation) -> OplogResult<()> {
        match confirmation {
            WipeConfirmation::EraseLocalData => {}
        }

        let config = self.merkle.config();
        let node = NodeId::random();
        if let Some(store) = &self.store {
            store.wipe()?;
            store.save_node_id(&node)?;
        }
        self.clock = HlcClock::new(node);
        self.log = MutationLog::new();
        self.snapshot = Snapshot::new();
        self.merkle = MerkleTree::with_config(config).unwrap_or_default();

        info!("replica wiped");
        Ok(())
    }
}

fn validate_names(table: &str, column: &str) -> OplogResult<()> {
    if table.is_empty() || table.len() > MAX_NAME_LEN {
        return Err(OplogError::MalformedRecord(format!(
            "table name length must be 1..={MAX_NAME_LEN}"
        )));
    }
    if column.is_empty() || column.len() > MAX_NAME_LEN {
        return Err(OplogError::MalformedRecord(format!(
            "column name length must be 1..={MAX_NAME_LEN}"
        )));
    }
    Ok(())
}
