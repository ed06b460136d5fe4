//! Owner identity: everything derived from one recovery phrase.

use crate::error::CryptoResult;
use crate::key::{derive_subkey, SymmetricKey, KEY_SIZE};
use crate::mnemonic::RecoveryPhrase;
use crate::signing::{Signature, SigningKey, VerifyingKey};
use offgrid_types::OwnerId;

const OWNER_ID_INFO: &str = "offgrid/v1/owner-id";
const SYMMETRIC_KEY_INFO: &str = "offgrid/v1/symmetric-key";
const SIGNING_KEY_INFO: &str = "offgrid/v1/signing-key";

/// The identity domain for one independently synchronized dataset.
///
/// Holds the recovery phrase and the material derived from it: the owner
/// id the relay addresses the dataset by, the symmetric key that seals
/// every transported batch, and the Ed25519 keypair that signs mutation
/// records and relay requests.
///
/// Every replica restored from the same phrase holds an identical `Owner`.
#[derive(Debug, Clone)]
pub struct Owner {
    id: OwnerId,
    phrase: RecoveryPhrase,
    symmetric_key: SymmetricKey,
    signing_key: SigningKey,
}

impl Owner {
    /// Creates a brand-new owner from fresh OS entropy.
    ///
    /// The returned owner's [`recovery_phrase`](Self::recovery_phrase)
    /// must be shown to the user for backup; it is the only way back in.
    pub fn create() -> CryptoResult<Self> {
        Self::from_phrase(RecoveryPhrase::generate()?)
    }

    /// Restores an owner from its recovery phrase.
    ///
    /// Deterministic: the same phrase always yields the same id and keys.
    /// Fails with [`CryptoError::InvalidMnemonic`](crate::CryptoError) if
    /// the phrase does not validate.
    pub fn restore(phrase: &str) -> CryptoResult<Self> {
        Self::from_phrase(RecoveryPhrase::parse(phrase)?)
    }

    fn from_phrase(phrase: RecoveryPhrase) -> CryptoResult<Self> {
        let seed = phrase.to_seed();

        let mut id_bytes = [0u8; 16];
        derive_subkey(&seed, OWNER_ID_INFO, &mut id_bytes)?;

        let mut key_bytes = [0u8; KEY_SIZE];
        derive_subkey(&seed, SYMMETRIC_KEY_INFO, &mut key_bytes)?;

        let mut signing_bytes = [0u8; 32];
        derive_subkey(&seed, SIGNING_KEY_INFO, &mut signing_bytes)?;

        Ok(Self {
            id: OwnerId::from_bytes(id_bytes),
            phrase,
            symmetric_key: SymmetricKey::from_bytes(key_bytes),
            signing_key: SigningKey::from_bytes(&signing_bytes),
        })
    }

    /// The dataset identity presented to the relay.
    #[must_use]
    pub const fn id(&self) -> OwnerId {
        self.id
    }

    /// The backup phrase, for display during onboarding.
    #[must_use]
    pub fn recovery_phrase(&self) -> String {
        self.phrase.phrase()
    }

    /// The key that seals transported batches.
    #[must_use]
    pub fn symmetric_key(&self) -> &SymmetricKey {
        &self.symmetric_key
    }

    /// Signs a message with the owner signing key.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// The signing key itself, for transports that sign autonomously.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The public half of the signing keypair.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}
