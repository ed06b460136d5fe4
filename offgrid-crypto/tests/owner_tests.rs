use offgrid_crypto::{CryptoError, Owner, RecoveryPhrase, WORD_COUNT};

// ── Creation ─────────────────────────────────────────────────────

#[test]
fn create_produces_twelve_word_phrase() {
    let owner = Owner::create().unwrap();
    assert_eq!(owner.recovery_phrase().split_whitespace().count(), WORD_COUNT);
}

#[test]
fn create_produces_distinct_owners() {
    let a = Owner::create().unwrap();
    let b = Owner::create().unwrap();
    assert_ne!(a.id(), b.id());
    assert_ne!(a.recovery_phrase(), b.recovery_phrase());
}

// ── Restore ──────────────────────────────────────────────────────

#[test]
fn restore_reproduces_identical_material() {
    let original = Owner::create().unwrap();
    let restored = Owner::restore(&original.recovery_phrase()).unwrap();

    assert_eq!(restored.id(), original.id());
    assert_eq!(restored.symmetric_key(), original.symmetric_key());
    assert_eq!(restored.verifying_key(), original.verifying_key());
}

#[test]
fn restore_twice_is_deterministic() {
    let phrase = Owner::create().unwrap().recovery_phrase();
    let a = Owner::restore(&phrase).unwrap();
    let b = Owner::restore(&phrase).unwrap();
    assert_eq!(a.id(), b.id());
    assert_eq!(a.verifying_key(), b.verifying_key());
}

#[test]
fn restore_rejects_unknown_word() {
    let err = Owner::restore(
        "zebra zebra zebra zebra zebra zebra zebra zebra zebra zebra zebra xyzzy",
    )
    .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidMnemonic(_)));
}

#[test]
fn restore_rejects_bad_checksum() {
    // Valid words, wrong checksum: "abandon" x12 is not a valid mnemonic
    // ("abandon" x11 + "about" is).
    let err = Owner::restore(
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon",
    )
    .unwrap_err();
    assert!(matches!(err, CryptoError::InvalidMnemonic(_)));
}

#[test]
fn restore_rejects_wrong_word_count() {
    let err = Owner::restore("abandon about").unwrap_err();
    assert!(matches!(err, CryptoError::InvalidMnemonic(_)));
}

#[test]
fn known_phrase_is_accepted() {
    let owner = Owner::restore(
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about",
    )
    .unwrap();
    // Derivation is stable across runs.
    let again = Owner::restore(&owner.recovery_phrase()).unwrap();
    assert_eq!(owner.id(), again.id());
}

// ── Phrase encoding ──────────────────────────────────────────────

#[test]
fn phrase_word_count() {
    let phrase = RecoveryPhrase::generate().unwrap();
    assert_eq!(phrase.phrase().split_whitespace().count(), WORD_COUNT);
}

#[test]
fn phrase_from_entropy_is_deterministic() {
    let a = RecoveryPhrase::from_entropy(&[7u8; 16]).unwrap();
    let b = RecoveryPhrase::from_entropy(&[7u8; 16]).unwrap();
    assert_eq!(a.phrase(), b.phrase());
}

// ── Signing ──────────────────────────────────────────────────────

#[test]
fn owner_signatures_verify() {
    let owner = Owner::create().unwrap();
    let sig = owner.sign(b"fingerprint request");
    assert!(owner
        .verifying_key()
        .verify(b"fingerprint request", &sig)
        .is_ok());
}

#[test]
fn restored_owner_can_verify_original_signatures() {
    let original = Owner::create().unwrap();
    let sig = original.sign(b"record bytes");
    let restored = Owner::restore(&original.recovery_phrase()).unwrap();
    assert!(restored.verifying_key().verify(b"record bytes", &sig).is_ok());
}

#[test]
fn foreign_owner_signatures_are_rejected() {
    let ours = Owner::create().unwrap();
    let theirs = Owner::create().unwrap();
    let sig = theirs.sign(b"record bytes");
    assert!(ours.verifying_key().verify(b"record bytes", &sig).is_err());
}
