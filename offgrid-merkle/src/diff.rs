//! Node addressing and the pure comparison step of tree reconciliation.
//!
//! These types cross the wire inside sync protocol messages, so they are
//! plain data: the narrowing loop that uses them lives in the sync client.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tree::NodeHash;

/// Address of one tree node: the root is `(0, 0)`, a node's children are
/// `(level + 1, index * 16 + k)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeRef {
    /// Distance from the root.
    pub level: u8,
    /// Position within the level.
    pub index: u64,
}

impl NodeRef {
    /// The root node.
    #[must_use]
    pub const fn root() -> Self {
        Self { level: 0, index: 0 }
    }
}

/// One node's hash, as exchanged during narrowing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSummary {
    /// Which node this summarizes.
    pub node: NodeRef,
    /// Its subtree hash.
    pub hash: NodeHash,
}

/// An inclusive range of leaf bucket indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketRange {
    /// First bucket in the range.
    pub start: u64,
    /// Last bucket in the range.
    pub end: u64,
}

impl BucketRange {
    /// A range covering a single bucket.
    #[must_use]
    pub const fn single(bucket: u64) -> Self {
        Self {
            start: bucket,
            end: bucket,
        }
    }

    /// Returns true if `bucket` falls inside the range.
    #[must_use]
    pub const fn contains(&self, bucket: u64) -> bool {
        self.start <= bucket && bucket <= self.end
    }
}

/// Outcome of comparing the child summaries of one frontier node.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChildDiff {
    /// Children present on both sides with differing hashes: descend.
    pub differing: Vec<NodeRef>,
    /// Children only we have: the whole subtree must be offered.
    pub local_only: Vec<NodeRef>,
    /// Children only the remote has: the whole subtree must be fetched.
    pub remote_only: Vec<NodeRef>,
}

impl ChildDiff {
    /// Returns true if both sides agreed on every child.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.differing.is_empty() && self.local_only.is_empty() && self.remote_only.is_empty()
    }
}

/// Compares local and remote child summaries covering the same frontier.
///
/// Matching hashes drop out; everything else is classified for the
/// narrowing loop. The comparison is symmetric apart from the
/// local/remote labeling.
#[must_use]
pub fn diff_children(local: &[NodeSummary], remote: &[NodeSummary]) -> ChildDiff {
    let remote_by_node: HashMap<NodeRef, NodeHash> =
        remote.iter().map(|s| (s.node, s.hash)).collect();
    let local_by_node: HashMap<NodeRef, NodeHash> =
        local.iter().map(|s| (s.node, s.hash)).collect();

    let mut diff = ChildDiff::default();

    for summary in local {
        match remote_by_node.get(&summary.node) {
            Some(remote_hash) if *remote_hash == summary.hash => {}
            Some(_) => diff.differing.push(summary.node),
            None => diff.local_only.push(summary.node),
        }
    }
    for summary in remote {
        if !local_by_node.contains_key(&summary.node) {
            diff.remote_only.push(summary.node);
        }
    }

    diff
}

/// Merges overlapping or adjacent bucket ranges into a minimal sorted set.
#[must_use]
pub fn coalesce_ranges(mut ranges: Vec<BucketRange>) -> Vec<BucketRange> {
    if ranges.is_empty() {
        return ranges;
    }
    ranges.sort();
    let mut merged: Vec<BucketRange> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end.saturating_add(1) => {
                last.end = last.end.max(range.end);
            }
            _ => merged.push(range),
        }
    }
    merged
}
