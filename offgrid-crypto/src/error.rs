//! Error types for the identity and encryption layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The recovery phrase could not be decoded (bad word, bad checksum,
    /// wrong word count). Fatal on restore; there is no partial recovery.
    #[error("invalid recovery phrase: {0}")]
    InvalidMnemonic(String),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption or authentication failed (wrong key or tampered data).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A public key could not be decoded.
    #[error("invalid public key")]
    InvalidKey,

    /// A signature did not verify against the message and key.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
