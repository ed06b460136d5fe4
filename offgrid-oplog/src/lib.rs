//! Append-only mutation log, LWW merge engine, and replica state.
//!
//! This crate is the heart of the replication core. A [`Replica`] owns,
//! for one dataset on one device:
//!
//! - the [`HlcClock`](offgrid_types::HlcClock) that stamps local writes,
//! - the append-only [`MutationLog`] — the only authoritative structure,
//! - the derived [`Snapshot`] of current cell winners,
//! - the [`MerkleTree`](offgrid_merkle::MerkleTree) summarizing the log,
//! - optional SQLite persistence via [`LogStore`].
//!
//! Merging is per-cell last-writer-wins over the timestamp total order,
//! which makes it commutative, associative, and idempotent: any ordering
//! or repetition of the same record set converges to the same snapshot.
//!
//! Local append/merge for one replica is single-writer: `Replica` takes
//! `&mut self` for every mutation, and the embedding layer serializes
//! access (the sync client uses an async mutex held only across local
//! steps, never across network awaits).

mod error;
mod log;
mod replica;
mod snapshot;
mod store;

pub use error::{OplogError, OplogResult};
pub use log::MutationLog;
pub use replica::{LocalCommit, MergeOutcome, Replica, WipeConfirmation};
pub use snapshot::{CellChange, CellKey, CellState, Snapshot};
pub use store::LogStore;
