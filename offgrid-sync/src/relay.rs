//! The relay abstraction and an in-process counterpart.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ExchangeRequest, ExchangeResponse, FingerprintRequest, SealedRecord, TreeFingerprint,
    PROTOCOL_VERSION,
};
use async_trait::async_trait;
use offgrid_crypto::Envelope;
use offgrid_merkle::MerkleTree;
use offgrid_types::{OwnerId, Timestamp};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::Mutex;

/// The remote counterpart of a sync round.
///
/// Both operations are idempotent and safe to retry: a fingerprint is a
/// pure read, and re-sending an exchange re-stores records the relay
/// already holds. The sync client leans on this for backoff-and-resume.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Fetches the remote tree fingerprint, optionally probing nodes for
    /// their child summaries.
    async fn get_fingerprint(
        &self,
        owner: OwnerId,
        request: FingerprintRequest,
    ) -> SyncResult<TreeFingerprint>;

    /// Stores our sealed records for the given ranges and returns the
    /// remote's sealed records in those ranges.
    async fn exchange_buckets(
        &self,
        owner: OwnerId,
        request: ExchangeRequest,
    ) -> SyncResult<ExchangeResponse>;
}

/// Per-owner state held by the in-process relay.
#[derive(Default)]
struct OwnerShelf {
    tree: MerkleTree,
    records: BTreeMap<Timestamp, Envelope>,
}

/// An in-process relay: the same storage shape a relay server keeps, held
/// in memory. Used by tests and by embedders that want loopback sync
/// between two replicas in one process.
///
/// Mirrors what a real relay can know: timestamps, bucket membership,
/// ciphertext. Nothing else exists on this side of the envelope.
#[derive(Default)]
pub struct MemoryRelay {
    shelves: Mutex<HashMap<OwnerId, OwnerShelf>>,
    /// When non-zero, the next N calls fail with a transient error.
    fail_next: AtomicU32,
}

impl MemoryRelay {
    /// Creates an empty relay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `calls` relay operations fail with a transient
    /// network error, for retry testing.
    pub fn fail_next(&self, calls: u32) {
        self.fail_next.store(calls, Ordering::SeqCst);
    }

    /// Number of sealed records stored for an owner.
    pub async fn stored_count(&self, owner: OwnerId) -> usize {
        self.shelves
            .lock()
            .await
            .get(&owner)
            .map_or(0, |shelf| shelf.records.len())
    }

    /// Replaces a stored record's payload with garbage, simulating
    /// relay-side tampering or bit rot.
    pub async fn corrupt_record(&self, owner: OwnerId, ts: Timestamp) -> bool {
        let mut shelves = self.shelves.lock().await;
        let Some(shelf) = shelves.get_mut(&owner) else {
            return false;
        };
        match shelf.records.get_mut(&ts) {
            Some(envelope) => {
                for byte in &mut envelope.ciphertext {
                    *byte ^= 0x5a;
                }
                true
            }
            None => false,
        }
    }

    fn check_fault(&self) -> SyncResult<()> {
        let remaining = self.fail_next.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::Network("injected fault".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RelayClient for MemoryRelay {
    async fn get_fingerprint(
        &self,
        owner: OwnerId,
        request: FingerprintRequest,
    ) -> SyncResult<TreeFingerprint> {
        self.check_fault()?;
        let mut shelves = self.shelves.lock().await;
        let shelf = shelves.entry(owner).or_default();

        let mut children = Vec::new();
        for node in &request.probe {
            children.extend(shelf.tree.child_summaries(*node));
        }

        Ok(TreeFingerprint {
            version: PROTOCOL_VERSION,
            merkle_root: shelf.tree.root(),
            record_count: shelf.tree.record_count(),
            children,
        })
    }

    async fn exchange_buckets(
        &self,
        owner: OwnerId,
        request: ExchangeRequest,
    ) -> SyncResult<ExchangeResponse> {
        self.check_fault()?;
        let mut shelves = self.shelves.lock().await;
        let shelf = shelves.entry(owner).or_default();

        // Store what the caller sent. Idempotent by record identity.
        let mut received = Vec::with_capacity(request.records.len());
        for sealed in request.records {
            received.push(sealed.timestamp);
            if shelf.tree.insert(&sealed.timestamp) {
                shelf.records.insert(sealed.timestamp, sealed.payload);
            }
        }

        // Return everything we hold in the ranges that did not just
        // arrive from the caller.
        let mut records = Vec::new();
        for range in &request.ranges {
            for ts in shelf.tree.timestamps_in_range(range) {
                if received.contains(&ts) {
                    continue;
                }
                if let Some(payload) = shelf.records.get(&ts) {
                    records.push(SealedRecord {
                        timestamp: ts,
                        payload: payload.clone(),
                    });
                }
            }
        }

        Ok(ExchangeResponse {
            version: PROTOCOL_VERSION,
            records,
        })
    }
}
