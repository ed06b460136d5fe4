//! Sync protocol messages.
//!
//! Everything the relay sees is in this file: node hashes, bucket ranges,
//! record timestamps, and sealed payloads. Table names, column names, row
//! ids, and values never appear here in plaintext.
//!
//! Both sides must run the same tree granularity for node addresses to
//! line up; the protocol version covers the bucket width and hash scheme.

use offgrid_crypto::Envelope;
use offgrid_merkle::{BucketRange, NodeHash, NodeRef, NodeSummary};
use offgrid_types::Timestamp;
use serde::{Deserialize, Serialize};

/// Protocol version for compatibility checking.
pub const PROTOCOL_VERSION: u32 = 1;

/// One sealed mutation record.
///
/// The timestamp rides in the clear: it is the record's identity, and the
/// relay needs it for bucket membership and its own tree. The payload is
/// the full record, sealed under the owner's symmetric key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedRecord {
    /// The record's identity.
    pub timestamp: Timestamp,
    /// The sealed record body.
    pub payload: Envelope,
}

/// Fingerprint request: root comparison plus optional narrowing probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FingerprintRequest {
    /// Protocol version.
    pub version: u32,
    /// Nodes whose child summaries the caller wants, for recursive
    /// narrowing. Empty on the first call of a round.
    #[serde(default)]
    pub probe: Vec<NodeRef>,
}

impl FingerprintRequest {
    /// A root-only fingerprint request.
    #[must_use]
    pub fn root() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            probe: Vec::new(),
        }
    }

    /// A narrowing request for the given frontier nodes.
    #[must_use]
    pub fn probe(nodes: Vec<NodeRef>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            probe: nodes,
        }
    }
}

/// Fingerprint response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeFingerprint {
    /// Protocol version.
    pub version: u32,
    /// The remote root, or `None` for an empty remote log.
    pub merkle_root: Option<NodeHash>,
    /// Total records the remote holds for this owner.
    pub record_count: u64,
    /// Child summaries of every probed node, concatenated.
    #[serde(default)]
    pub children: Vec<NodeSummary>,
}

/// Exchange request: sealed records for a set of divergent bucket ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRequest {
    /// Protocol version.
    pub version: u32,
    /// The divergent ranges this exchange covers.
    pub ranges: Vec<BucketRange>,
    /// Our records in those ranges, sealed.
    pub records: Vec<SealedRecord>,
}

impl ExchangeRequest {
    /// Creates an exchange request.
    #[must_use]
    pub fn new(ranges: Vec<BucketRange>, records: Vec<SealedRecord>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            ranges,
            records,
        }
    }
}

/// Exchange response: the remote's records for the requested ranges,
/// minus anything that arrived in the request itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeResponse {
    /// Protocol version.
    pub version: u32,
    /// Sealed records the caller is missing.
    pub records: Vec<SealedRecord>,
}
