//! Ed25519 signing and verification for mutation records and relay
//! authentication.

use ed25519_dalek::{
    Signer as _, Verifier as _,
    Signature as DalekSignature,
    SigningKey as DalekSigningKey,
    VerifyingKey as DalekVerifyingKey,
};

use crate::error::{CryptoError, CryptoResult};

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_LEN: usize = 64;

/// Ed25519 signing key (secret).
#[derive(Clone)]
pub struct SigningKey(DalekSigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(DalekVerifyingKey);

/// Ed25519 signature bytes.
#[derive(Clone)]
pub struct Signature(DalekSignature);

impl SigningKey {
    /// Creates a signing key from a raw 32-byte secret.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self(DalekSigningKey::from_bytes(bytes))
    }

    /// Returns the raw 32-byte secret key.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Signs a message and returns the signature.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message))
    }

    /// Returns the corresponding verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

impl VerifyingKey {
    /// Creates a verifying key from a raw 32-byte public key.
    pub fn from_bytes(bytes: &[u8; 32]) -> CryptoResult<Self> {
        DalekVerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey)
    }

    /// Returns the raw 32-byte public key.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// The public key as lowercase hex, for headers and diagnostics.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Verifies a signature against a message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::SignatureInvalid)
    }

    /// Verifies a raw signature byte slice against a message.
    ///
    /// Convenience for callers that carry signatures as plain bytes, as
    /// mutation records do.
    pub fn verify_bytes(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let sig = Signature::from_slice(signature)?;
        self.verify(message, &sig)
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("hex", &self.to_hex())
            .finish()
    }
}

impl Signature {
    /// Creates a signature from a raw 64-byte value.
    #[must_use]
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LEN]) -> Self {
        Self(DalekSignature::from_bytes(bytes))
    }

    /// Creates a signature from a byte slice of any length, rejecting
    /// wrong sizes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; SIGNATURE_LEN] = bytes
            .try_into()
            .map_err(|_| CryptoError::SignatureInvalid)?;
        Ok(Self::from_bytes(&arr))
    }

    /// Returns the raw 64-byte signature.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }

    /// The signature as lowercase hex, for headers.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature").field("hex", &self.to_hex()).finish()
    }
}
