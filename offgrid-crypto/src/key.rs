//! Key material and HKDF subkey derivation.

use crate::error::{CryptoError, CryptoResult};
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of symmetric keys in bytes (256 bits for ChaCha20).
pub const KEY_SIZE: usize = 32;

/// A symmetric encryption key with automatic zeroization on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Derives `out.len()` bytes of subkey material from a seed.
///
/// Every derived value uses a distinct `info` string for domain
/// separation, so the owner id, encryption key, and signing key are
/// independent even though they share one seed.
pub fn derive_subkey(seed: &[u8], info: &str, out: &mut [u8]) -> CryptoResult<()> {
    let hkdf = Hkdf::<Sha256>::new(None, seed);
    hkdf.expand(info.as_bytes(), out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
}
