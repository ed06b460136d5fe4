//! Relay sync protocol and transport client for Offgrid.
//!
//! Reconciliation is driven entirely from the device side against a relay
//! that never sees plaintext:
//!
//! 1. **Fingerprint**: exchange Merkle root hashes; equal roots mean the
//!    logs are identical and the round ends.
//! 2. **Narrowing**: breadth-first exchange of child-level hashes, down
//!    to the leaf buckets that actually differ.
//! 3. **Exchange**: sealed record batches for the divergent bucket
//!    ranges, bidirectionally, resuming range by range.
//!
//! Because merge is idempotent and commutative, every step is safe to
//! retry, repeat, or abandon halfway: partial progress is kept, never
//! corrupting. Local reads and writes never block on any of this.
//!
//! The remote counterpart is abstracted by [`RelayClient`] as two
//! idempotent operations; [`HttpRelayClient`] binds them to a relay
//! server over HTTPS and [`MemoryRelay`] provides an in-process
//! counterpart for tests and loopback sync.

mod client;
mod error;
mod http;
mod protocol;
mod relay;

pub use client::{ChangeSink, RoundReport, SyncClient, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use http::{HttpRelayClient, KEY_HEADER, SIGNATURE_HEADER};
pub use protocol::{
    ExchangeRequest, ExchangeResponse, FingerprintRequest, SealedRecord, TreeFingerprint,
    PROTOCOL_VERSION,
};
pub use relay::{MemoryRelay, RelayClient};
