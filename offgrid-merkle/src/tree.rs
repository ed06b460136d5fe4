//! The tree itself: sparse bucketed leaves under a fixed-depth radix-16
//! index.

use crate::diff::{BucketRange, NodeRef, NodeSummary};
use offgrid_types::Timestamp;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

/// Children per internal node. Node addresses are hex digits of the
/// bucket index, so this is fixed; the tunable granularity knob is the
/// bucket width.
pub const FAN_OUT: u64 = 16;

const LEAF_DOMAIN: &[u8] = b"offgrid/leaf";
const NODE_DOMAIN: &[u8] = b"offgrid/node";

/// Errors from tree construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MerkleError {
    /// The configured bucket width is unusable.
    #[error("bucket width must be at least 1ms")]
    InvalidBucketWidth,
}

/// A SHA-256 node hash, rendered as 64 hex chars.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHash([u8; 32]);

impl NodeHash {
    /// Creates a hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeHash({self})")
    }
}

impl Serialize for NodeHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NodeHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))?;
        Ok(Self(arr))
    }
}

/// Tree granularity configuration.
///
/// Narrower buckets mean finer diffs (fewer records re-exchanged per
/// divergent bucket) at the cost of a deeper narrowing phase; wider
/// buckets the reverse. The default of one minute suits logs where write
/// bursts cluster in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleConfig {
    /// Width of one leaf bucket in milliseconds.
    pub bucket_width_ms: u64,
}

impl Default for MerkleConfig {
    fn default() -> Self {
        Self {
            bucket_width_ms: 60_000,
        }
    }
}

/// Hash tree over time-bucketed log contents.
///
/// Only leaves are authoritative state; every internal hash is a cache
/// rebuilt on demand. Serialization therefore carries the leaves alone.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "TreeState", into = "TreeState")]
pub struct MerkleTree {
    config: MerkleConfig,
    depth: u8,
    /// bucket index → ordered record identities in that bucket.
    leaves: BTreeMap<u64, BTreeSet<Timestamp>>,
    record_count: u64,
    /// Clean hashes by (level, index); entries on a dirty path are evicted
    /// on insert and recomputed lazily.
    cache: HashMap<(u8, u64), NodeHash>,
}

/// The persisted shape of a tree.
#[derive(Serialize, Deserialize)]
struct TreeState {
    config: MerkleConfig,
    leaves: BTreeMap<u64, BTreeSet<Timestamp>>,
}

impl From<TreeState> for MerkleTree {
    fn from(state: TreeState) -> Self {
        let mut tree = MerkleTree::with_config_unchecked(state.config);
        for (_, bucket) in state.leaves {
            for ts in bucket {
                tree.insert(&ts);
            }
        }
        tree
    }
}

impl From<MerkleTree> for TreeState {
    fn from(tree: MerkleTree) -> Self {
        Self {
            config: tree.config,
            leaves: tree.leaves,
        }
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::with_config_unchecked(MerkleConfig::default())
    }
}

impl MerkleTree {
    /// Creates an empty tree with the default bucket width.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tree with the given configuration.
    pub fn with_config(config: MerkleConfig) -> Result<Self, MerkleError> {
        if config.bucket_width_ms == 0 {
            return Err(MerkleError::InvalidBucketWidth);
        }
        Ok(Self::with_config_unchecked(config))
    }

    fn with_config_unchecked(config: MerkleConfig) -> Self {
        let width = config.bucket_width_ms.max(1);
        let max_bucket = u64::MAX / width;
        // Smallest depth whose radix-16 index space covers every bucket.
        let mut depth = 0u8;
        let mut span = 1u128;
        while span <= max_bucket as u128 {
            span *= FAN_OUT as u128;
            depth += 1;
        }
        Self {
            config,
            depth,
            leaves: BTreeMap::new(),
            record_count: 0,
            cache: HashMap::new(),
        }
    }

    /// The tree's configuration.
    #[must_use]
    pub const fn config(&self) -> MerkleConfig {
        self.config
    }

    /// The leaf level of this tree.
    #[must_use]
    pub const fn leaf_level(&self) -> u8 {
        self.depth
    }

    /// Number of record identities in the tree.
    #[must_use]
    pub const fn record_count(&self) -> u64 {
        self.record_count
    }

    /// The bucket a timestamp falls into.
    #[must_use]
    pub const fn bucket_of(&self, ts: &Timestamp) -> u64 {
        ts.millis() / self.config.bucket_width_ms
    }

    /// Rebuilds a tree from scratch out of a record-identity iterator.
    pub fn rebuild_from<I>(config: MerkleConfig, timestamps: I) -> Result<Self, MerkleError>
    where
        I: IntoIterator<Item = Timestamp>,
    {
        let mut tree = Self::with_config(config)?;
        for ts in timestamps {
            tree.insert(&ts);
        }
        Ok(tree)
    }

    /// Inserts a record identity, dirtying its leaf-to-root path.
    ///
    /// Returns false if the identity was already present (idempotent).
    pub fn insert(&mut self, ts: &Timestamp) -> bool {
        let bucket = self.bucket_of(ts);
        let inserted = self.leaves.entry(bucket).or_default().insert(*ts);
        if inserted {
            self.record_count += 1;
            for level in 0..=self.depth {
                self.cache.remove(&(level, ancestor_index(bucket, self.depth, level)));
            }
        }
        inserted
    }

    /// Returns true if the record identity is present.
    #[must_use]
    pub fn contains(&self, ts: &Timestamp) -> bool {
        self.leaves
            .get(&self.bucket_of(ts))
            .is_some_and(|bucket| bucket.contains(ts))
    }

    /// The root hash, or `None` for an empty tree.
    pub fn root(&mut self) -> Option<NodeHash> {
        self.node_hash(NodeRef::root())
    }

    /// The hash of an arbitrary node, or `None` if its subtree is empty.
    pub fn node_hash(&mut self, node: NodeRef) -> Option<NodeHash> {
        if self.subtree_is_empty(node) {
            return None;
        }
        if let Some(hash) = self.cache.get(&(node.level, node.index)) {
            return Some(*hash);
        }

        let hash = if node.level == self.depth {
            let mut hasher = Sha256::new();
            hasher.update(LEAF_DOMAIN);
            if let Some(bucket) = self.leaves.get(&node.index) {
                for ts in bucket {
                    hasher.update(ts.to_string().as_bytes());
                    hasher.update([0u8]);
                }
            }
            NodeHash(hasher.finalize().into())
        } else {
            let mut hasher = Sha256::new();
            hasher.update(NODE_DOMAIN);
            for k in 0..FAN_OUT {
                let child = NodeRef {
                    level: node.level + 1,
                    index: node.index * FAN_OUT + k,
                };
                if let Some(child_hash) = self.node_hash(child) {
                    // Tag each contributing child with its position so
                    // sibling content cannot shift without changing us.
                    hasher.update([k as u8]);
                    hasher.update(child_hash.as_bytes());
                }
            }
            NodeHash(hasher.finalize().into())
        };

        self.cache.insert((node.level, node.index), hash);
        Some(hash)
    }

    /// Summaries of a node's non-empty children, in index order.
    pub fn child_summaries(&mut self, node: NodeRef) -> Vec<NodeSummary> {
        if node.level >= self.depth {
            return Vec::new();
        }
        let mut summaries = Vec::new();
        for k in 0..FAN_OUT {
            let child = NodeRef {
                level: node.level + 1,
                index: node.index * FAN_OUT + k,
            };
            if let Some(hash) = self.node_hash(child) {
                summaries.push(NodeSummary { node: child, hash });
            }
        }
        summaries
    }

    /// The inclusive bucket range a node's subtree covers.
    #[must_use]
    pub fn node_range(&self, node: NodeRef) -> BucketRange {
        let shift = 4u32 * u32::from(self.depth - node.level);
        if shift >= 64 {
            return BucketRange {
                start: 0,
                end: u64::MAX,
            };
        }
        let span = 1u64 << shift;
        BucketRange {
            start: node.index * span,
            end: node.index * span + (span - 1),
        }
    }

    /// All record identities whose buckets fall in the given range, in
    /// timestamp order.
    #[must_use]
    pub fn timestamps_in_range(&self, range: &BucketRange) -> Vec<Timestamp> {
        self.leaves
            .range(range.start..=range.end)
            .flat_map(|(_, bucket)| bucket.iter().copied())
            .collect()
    }

    /// Non-empty bucket indexes in the given range.
    #[must_use]
    pub fn buckets_in_range(&self, range: &BucketRange) -> Vec<u64> {
        self.leaves.range(range.start..=range.end).map(|(b, _)| *b).collect()
    }

    fn subtree_is_empty(&self, node: NodeRef) -> bool {
        let range = self.node_range(node);
        self.leaves.range(range.start..=range.end).next().is_none()
    }
}

impl fmt::Debug for MerkleTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleTree")
            .field("config", &self.config)
            .field("depth", &self.depth)
            .field("buckets", &self.leaves.len())
            .field("record_count", &self.record_count)
            .finish()
    }
}

/// The index of `bucket`'s ancestor at `level` in a tree of `depth`.
const fn ancestor_index(bucket: u64, depth: u8, level: u8) -> u64 {
    let shift = 4 * (depth - level) as u32;
    if shift >= 64 { 0 } else { bucket >> shift }
}
