//! The sync client: drives reconciliation rounds against a relay.

use crate::error::{SyncError, SyncResult};
use crate::protocol::{ExchangeRequest, FingerprintRequest, SealedRecord};
use crate::relay::RelayClient;
use offgrid_crypto::{open_json, seal_json};
use offgrid_merkle::{coalesce_ranges, diff_children, BucketRange, NodeRef, NodeSummary};
use offgrid_oplog::{CellChange, Replica};
use offgrid_types::MutationRecord;
use rand::Rng;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Receives snapshot changes produced by merge rounds, synchronously,
/// before the round completes — this is what gives readers
/// read-after-merge consistency.
pub type ChangeSink = Arc<dyn Fn(&[CellChange]) + Send + Sync>;

/// Configuration for the sync client.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Retries per relay call after the first attempt.
    pub max_retries: u32,
    /// First backoff delay.
    pub initial_backoff_ms: u64,
    /// Backoff ceiling.
    pub max_backoff_ms: u64,
    /// Per-call timeout.
    pub request_timeout_ms: u64,
    /// Divergent ranges exchanged per relay call; the resume unit.
    pub max_ranges_per_exchange: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 8_000,
            request_timeout_ms: 30_000,
            max_ranges_per_exchange: 16,
        }
    }
}

/// What one reconciliation round did.
#[derive(Debug, Clone, Default)]
pub struct RoundReport {
    /// The roots matched; nothing to do.
    pub already_in_sync: bool,
    /// This call coalesced into a round that was already in flight.
    pub coalesced: bool,
    /// Divergent bucket ranges exchanged.
    pub ranges_exchanged: usize,
    /// Sealed records sent to the relay.
    pub records_sent: usize,
    /// Sealed records received from the relay.
    pub records_received: usize,
    /// Records merged into the log.
    pub applied: usize,
    /// Records received that were already present.
    pub duplicates: usize,
    /// Records rejected by validation or signature checks.
    pub rejected: usize,
    /// Envelopes dropped because they failed decryption/authentication.
    pub auth_failures: usize,
}

/// Drives sync rounds for one replica against one relay.
///
/// Only one round per owner is in flight at a time: concurrent `sync()`
/// calls coalesce into the active round instead of executing twice. The
/// replica lock is held only across local steps, never across a network
/// await, so local reads and writes stay responsive while a round runs.
pub struct SyncClient {
    replica: Arc<Mutex<Replica>>,
    relay: Arc<dyn RelayClient>,
    config: SyncConfig,
    round_lock: Arc<Mutex<()>>,
    last_report: std::sync::Mutex<RoundReport>,
    change_sink: Option<ChangeSink>,
}

impl SyncClient {
    /// Creates a sync client with default configuration.
    pub fn new(replica: Arc<Mutex<Replica>>, relay: Arc<dyn RelayClient>) -> Self {
        Self::with_config(replica, relay, SyncConfig::default())
    }

    /// Creates a sync client with explicit configuration.
    pub fn with_config(
        replica: Arc<Mutex<Replica>>,
        relay: Arc<dyn RelayClient>,
        config: SyncConfig,
    ) -> Self {
        Self {
            replica,
            relay,
            config,
            round_lock: Arc::new(Mutex::new(())),
            last_report: std::sync::Mutex::new(RoundReport::default()),
            change_sink: None,
        }
    }

    /// Registers a sink that receives merged changes before each round
    /// completes. Typically wired to the materializer.
    #[must_use]
    pub fn with_change_sink(mut self, sink: ChangeSink) -> Self {
        self.change_sink = Some(sink);
        self
    }

    /// The replica this client syncs.
    #[must_use]
    pub fn replica(&self) -> Arc<Mutex<Replica>> {
        self.replica.clone()
    }

    /// Runs one reconciliation round.
    ///
    /// If a round is already in flight, waits for it and returns its
    /// report with `coalesced` set instead of starting a second round.
    pub async fn sync(&self) -> SyncResult<RoundReport> {
        match self.round_lock.clone().try_lock_owned() {
            Ok(_guard) => {
                let result = self.run_round().await;
                if let Ok(report) = &result {
                    *self.last_report.lock().unwrap() = report.clone();
                }
                result
            }
            Err(_) => {
                // Coalesce: wait for the active round, then report what
                // it did rather than doing the work twice.
                let _wait = self.round_lock.lock().await;
                let mut report = self.last_report.lock().unwrap().clone();
                report.coalesced = true;
                Ok(report)
            }
        }
    }

    async fn run_round(&self) -> SyncResult<RoundReport> {
        let mut report = RoundReport::default();

        // Step 1: root comparison.
        let (owner_id, local_root) = {
            let mut replica = self.replica.lock().await;
            (replica.owner().id(), replica.merkle().root())
        };
        let fingerprint = self
            .retrying(|| {
                self.relay
                    .get_fingerprint(owner_id, FingerprintRequest::root())
            })
            .await?;

        if fingerprint.merkle_root == local_root {
            debug!(owner = %owner_id, "roots match, nothing to sync");
            report.already_in_sync = true;
            return Ok(report);
        }

        // Step 2: narrow to divergent bucket ranges.
        let ranges = self.narrow(owner_id).await?;
        if ranges.is_empty() {
            // A local write can land between fingerprint and narrowing;
            // the next round picks it up.
            report.already_in_sync = true;
            return Ok(report);
        }
        info!(owner = %owner_id, ranges = ranges.len(), "exchanging divergent ranges");

        // Step 3: exchange sealed batches, resuming range chunk by range
        // chunk. Chunks already exchanged stay merged if a later chunk
        // fails — merge idempotence makes the partial progress safe.
        for chunk in ranges.chunks(self.config.max_ranges_per_exchange.max(1)) {
            self.exchange_chunk(owner_id, chunk, &mut report).await?;
            report.ranges_exchanged += chunk.len();
        }

        // Flush the tree and clock so a clean restart skips the rebuild.
        self.replica.lock().await.persist_state()?;

        info!(
            owner = %owner_id,
            applied = report.applied,
            sent = report.records_sent,
            auth_failures = report.auth_failures,
            "round complete"
        );
        Ok(report)
    }

    /// Breadth-first narrowing: compare child hashes level by level until
    /// only leaf buckets remain.
    async fn narrow(&self, owner_id: offgrid_types::OwnerId) -> SyncResult<Vec<BucketRange>> {
        let mut divergent: Vec<BucketRange> = Vec::new();
        let mut frontier = vec![NodeRef::root()];

        while !frontier.is_empty() {
            let (local_children, leaf_level): (Vec<NodeSummary>, u8) = {
                let mut replica = self.replica.lock().await;
                let tree = replica.merkle();
                let mut summaries = Vec::new();
                for node in &frontier {
                    summaries.extend(tree.child_summaries(*node));
                }
                (summaries, tree.leaf_level())
            };

            let response = self
                .retrying(|| {
                    self.relay
                        .get_fingerprint(owner_id, FingerprintRequest::probe(frontier.clone()))
                })
                .await?;

            let diff = diff_children(&local_children, &response.children);
            let mut next_frontier = Vec::new();

            {
                let mut replica = self.replica.lock().await;
                let tree = replica.merkle();
                for node in diff.local_only.into_iter().chain(diff.remote_only) {
                    // One side has nothing under this subtree: no point
                    // narrowing further, the whole range diverges.
                    divergent.push(tree.node_range(node));
                }
            }
            for node in diff.differing {
                if node.level >= leaf_level {
                    divergent.push(BucketRange::single(node.index));
                } else {
                    next_frontier.push(node);
                }
            }

            frontier = next_frontier;
        }

        Ok(coalesce_ranges(divergent))
    }

    /// Exchanges one chunk of ranges: seal ours, send, open theirs,
    /// merge. Envelopes that fail authentication are dropped and counted
    /// without aborting the rest of the chunk.
    async fn exchange_chunk(
        &self,
        owner_id: offgrid_types::OwnerId,
        chunk: &[BucketRange],
        report: &mut RoundReport,
    ) -> SyncResult<()> {
        let (outgoing, key) = {
            let replica = self.replica.lock().await;
            (
                replica.records_in_buckets(chunk),
                replica.owner().symmetric_key().clone(),
            )
        };

        let mut sealed = Vec::with_capacity(outgoing.len());
        for record in &outgoing {
            sealed.push(SealedRecord {
                timestamp: record.timestamp,
                payload: seal_json(&key, record)?,
            });
        }
        report.records_sent += sealed.len();

        let request = ExchangeRequest::new(chunk.to_vec(), sealed);
        let response = self
            .retrying(|| self.relay.exchange_buckets(owner_id, request.clone()))
            .await?;
        report.records_received += response.records.len();

        let mut incoming: Vec<MutationRecord> = Vec::with_capacity(response.records.len());
        for sealed in response.records {
            match open_json::<MutationRecord>(&key, &sealed.payload) {
                Ok(record) if record.timestamp == sealed.timestamp => incoming.push(record),
                Ok(record) => {
                    warn!(
                        claimed = %sealed.timestamp,
                        actual = %record.timestamp,
                        "dropping record whose visible identity does not match its payload"
                    );
                    report.auth_failures += 1;
                }
                Err(e) => {
                    warn!(timestamp = %sealed.timestamp, "dropping unopenable envelope: {e}");
                    report.auth_failures += 1;
                }
            }
        }

        let outcome = {
            let mut replica = self.replica.lock().await;
            replica.apply_remote(incoming)?
        };
        report.applied += outcome.applied;
        report.duplicates += outcome.duplicates;
        report.rejected += outcome.rejected;

        if let (Some(sink), false) = (&self.change_sink, outcome.changes.is_empty()) {
            sink(&outcome.changes);
        }
        Ok(())
    }

    /// Runs a relay call with timeout, bounded retries, and exponential
    /// backoff with jitter. Non-transient errors surface immediately.
    async fn retrying<T, F, Fut>(&self, mut call: F) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = SyncResult<T>>,
    {
        let timeout = Duration::from_millis(self.config.request_timeout_ms);
        let mut backoff_ms = self.config.initial_backoff_ms.max(1);
        let mut attempt = 0u32;

        loop {
            let error = match tokio::time::timeout(timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if e.is_transient() => e,
                Ok(Err(e)) => return Err(e),
                Err(_) => SyncError::Timeout,
            };

            attempt += 1;
            if attempt > self.config.max_retries {
                warn!(attempts = attempt, "relay call failed after retries: {error}");
                return Err(error);
            }

            let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 2);
            debug!(attempt, backoff_ms, "transient relay failure, backing off: {error}");
            tokio::time::sleep(Duration::from_millis(backoff_ms + jitter)).await;
            backoff_ms = (backoff_ms * 2).min(self.config.max_backoff_ms);
        }
    }
}
