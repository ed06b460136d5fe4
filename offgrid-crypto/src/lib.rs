//! Identity, key derivation, and the encryption envelope for Offgrid.
//!
//! One recovery phrase is the root of everything an owner needs:
//!
//! ```text
//! recovery phrase ──BIP-39──▶ seed ──HKDF-SHA256──▶ owner id
//!                                               ├─▶ symmetric key (ChaCha20-Poly1305)
//!                                               └─▶ signing keypair (Ed25519)
//! ```
//!
//! The derivation is one-way and deterministic: restoring the phrase on a
//! new device reproduces identical key material, and nothing recoverable
//! exists outside the phrase.

mod envelope;
mod error;
mod key;
mod mnemonic;
mod owner;
mod signing;

pub use envelope::{Envelope, open, open_json, seal, seal_json, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_subkey, SymmetricKey, KEY_SIZE};
pub use mnemonic::{RecoveryPhrase, ENTROPY_SIZE, WORD_COUNT};
pub use owner::Owner;
pub use signing::{Signature, SigningKey, VerifyingKey, SIGNATURE_LEN};
