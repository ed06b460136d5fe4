//! Bucketed Merkle synchronization tree.
//!
//! The tree summarizes a mutation log so two replicas can find where their
//! logs diverge while exchanging only hashes:
//!
//! - Leaves partition the timestamp millis axis into fixed-width buckets.
//! - A leaf hash covers the ordered timestamps (record identities) in its
//!   bucket; an internal node hashes its ordered, index-tagged children.
//! - The root summarizes the whole log: identical logs produce identical
//!   roots regardless of device or insertion order.
//!
//! Inserts only mark the leaf-to-root path dirty; hashes are recomputed
//! lazily the next time the tree is read, so a burst of local writes costs
//! one rehash of the touched path.

mod diff;
mod tree;

pub use diff::{coalesce_ranges, diff_children, BucketRange, ChildDiff, NodeRef, NodeSummary};
pub use tree::{MerkleConfig, MerkleError, MerkleTree, NodeHash, FAN_OUT};
