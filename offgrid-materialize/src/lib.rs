//! Applies merged snapshot state to local storage and notifies query
//! consumers.
//!
//! The materializer owns the bridge from the replication core to the
//! embedding application's storage engine:
//!
//! - [`RelationalStore`] is the storage collaborator: transactional
//!   `execute`/`query` with externally managed schema DDL. A
//!   [`SqliteStore`] adapter is provided.
//! - [`Materializer`] folds [`CellChange`](offgrid_oplog::CellChange)
//!   sets into the store as upserts (or row deletes for tombstones),
//!   skipping tables and columns the local schema does not know — those
//!   cells stay in the log until a schema migration catches up.
//! - [`Materializer::subscribe`] registers change observers and returns a
//!   cancellation handle, independent of any UI lifecycle.
//!
//! Changes are written to the store before observers run, so any read
//! issued after a merge round completes observes the merged state.

mod error;
mod materializer;
mod store;

pub use error::{MaterializeError, MaterializeResult};
pub use materializer::{ChangeNotification, Materializer, Subscription, TableSchema};
pub use store::{RelationalStore, SqliteStore};
