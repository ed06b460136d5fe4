//! The transport encryption envelope, using ChaCha20-Poly1305.
//!
//! Everything that leaves the device is sealed here first. The relay
//! observes envelope sizes and the timestamps used for tree exchange;
//! table names, column names, row ids, and values only ever exist in
//! plaintext on the owner's devices.

use crate::error::{CryptoError, CryptoResult};
use crate::key::SymmetricKey;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Size of nonce in bytes (96 bits for ChaCha20-Poly1305).
pub const NONCE_SIZE: usize = 12;

/// Size of the authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Sealed data with the metadata needed to open it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The nonce used for encryption (unique per seal).
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext (includes the auth tag).
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Returns the total size of the sealed data.
    #[must_use]
    pub fn len(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    /// Returns true if the ciphertext is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }

    /// Encodes to base64 for storage or transmission.
    #[must_use]
    pub fn to_base64(&self) -> String {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let mut bytes = Vec::with_capacity(self.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        STANDARD.encode(&bytes)
    }

    /// Decodes from base64.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        use base64::{engine::general_purpose::STANDARD, Engine};
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Authentication(format!("invalid base64: {e}")))?;

        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Authentication("data too short".to_string()));
        }

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[..NONCE_SIZE]);
        Ok(Self {
            nonce,
            ciphertext: bytes[NONCE_SIZE..].to_vec(),
        })
    }
}

/// Seals plaintext under the owner's symmetric key.
pub fn seal(key: &SymmetricKey, plaintext: &[u8]) -> CryptoResult<Envelope> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(Envelope {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Opens an envelope, authenticating it in the process.
///
/// Fails with [`CryptoError::Authentication`] on a wrong key or tampered
/// data; the caller drops the batch instead of merging it.
pub fn open(key: &SymmetricKey, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
    let cipher = ChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::from_slice(&envelope.nonce);

    cipher
        .decrypt(nonce, envelope.ciphertext.as_ref())
        .map_err(|_| {
            CryptoError::Authentication("wrong key or tampered data".to_string())
        })
}

/// Seals any serializable value as JSON.
pub fn seal_json<T: Serialize>(key: &SymmetricKey, value: &T) -> CryptoResult<Envelope> {
    let plaintext = serde_json::to_vec(value)?;
    seal(key, &plaintext)
}

/// Opens an envelope and deserializes its JSON payload.
pub fn open_json<T: DeserializeOwned>(key: &SymmetricKey, envelope: &Envelope) -> CryptoResult<T> {
    let plaintext = open(key, envelope)?;
    Ok(serde_json::from_slice(&plaintext)?)
}
