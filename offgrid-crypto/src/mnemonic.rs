//! BIP-39 recovery phrases.
//!
//! The phrase is the sole backup of an owner's key material: a fixed-length
//! sequence of English wordlist words with an embedded checksum. Losing it
//! makes the dataset unrecoverable after a reset; leaking it leaks the
//! dataset.

use crate::error::{CryptoError, CryptoResult};
use bip39::Mnemonic;
use rand::RngCore;
use std::fmt;

/// Number of words in a recovery phrase.
pub const WORD_COUNT: usize = 12;

/// Bytes of entropy encoded by the phrase (128 bits → 12 words).
pub const ENTROPY_SIZE: usize = 16;

/// A validated recovery phrase.
#[derive(Clone)]
pub struct RecoveryPhrase {
    mnemonic: Mnemonic,
}

impl RecoveryPhrase {
    /// Generates a fresh phrase from OS entropy.
    pub fn generate() -> CryptoResult<Self> {
        let mut entropy = [0u8; ENTROPY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut entropy);
        Self::from_entropy(&entropy)
    }

    /// Encodes existing entropy as a phrase.
    pub fn from_entropy(entropy: &[u8]) -> CryptoResult<Self> {
        let mnemonic = Mnemonic::from_entropy(entropy)
            .map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))?;
        Ok(Self { mnemonic })
    }

    /// Parses and validates a phrase, including its checksum.
    pub fn parse(phrase: &str) -> CryptoResult<Self> {
        let mnemonic =
            Mnemonic::parse(phrase).map_err(|e| CryptoError::InvalidMnemonic(e.to_string()))?;
        if mnemonic.word_count() != WORD_COUNT {
            return Err(CryptoError::InvalidMnemonic(format!(
                "expected {WORD_COUNT} words, got {}",
                mnemonic.word_count()
            )));
        }
        Ok(Self { mnemonic })
    }

    /// The phrase as a space-separated word string, for display to the
    /// user during backup.
    #[must_use]
    pub fn phrase(&self) -> String {
        self.mnemonic.to_string()
    }

    /// Derives the 64-byte seed all key material descends from.
    #[must_use]
    pub fn to_seed(&self) -> [u8; 64] {
        self.mnemonic.to_seed("")
    }
}

impl fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecoveryPhrase")
            .field("phrase", &"[REDACTED]")
            .finish()
    }
}
