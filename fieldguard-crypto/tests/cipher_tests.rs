use fieldguard_crypto::{
    decrypt, encrypt, encrypt_deterministic, DerivedKey, EncryptedData, NONCE_SIZE, TAG_SIZE,
};

fn key(seed: u8) -> DerivedKey {
    DerivedKey::from_bytes([seed; 32])
}

// ── Randomized mode ──────────────────────────────────────────────

#[test]
fn randomized_roundtrip() {
    let key = key(7);
    let encrypted = encrypt(&key, b"a@b.com").unwrap();
    assert_eq!(decrypt(&key, &encrypted).unwrap(), b"a@b.com");
}

#[test]
fn randomized_repeats_are_indistinguishable() {
    let key = key(7);
    let e1 = encrypt(&key, b"same").unwrap();
    let e2 = encrypt(&key, b"same").unwrap();
    assert_ne!(e1.nonce, e2.nonce);
    assert_ne!(e1.ciphertext, e2.ciphertext);
}

#[test]
fn wrong_key_fails_decryption() {
    let encrypted = encrypt(&key(1), b"Secret").unwrap();
    assert!(decrypt(&key(2), &encrypted).is_err());
}

#[test]
fn tampered_data_fails_decryption() {
    let key = key(7);
    let mut encrypted = encrypt(&key, b"Secret").unwrap();
    encrypted.ciphertext[0] ^= 0xFF;
    assert!(decrypt(&key, &encrypted).is_err());
}

// ── Deterministic mode ───────────────────────────────────────────

#[test]
fn deterministic_equal_plaintexts_equal_ciphertexts() {
    let key = key(7);
    let e1 = encrypt_deterministic(&key, b"a@b.com").unwrap();
    let e2 = encrypt_deterministic(&key, b"a@b.com").unwrap();
    assert_eq!(e1, e2);
}

#[test]
fn deterministic_distinct_plaintexts_distinct_ciphertexts() {
    let key = key(7);
    let e1 = encrypt_deterministic(&key, b"a@b.com").unwrap();
    let e2 = encrypt_deterministic(&key, b"c@d.com").unwrap();
    assert_ne!(e1.nonce, e2.nonce);
    assert_ne!(e1.ciphertext, e2.ciphertext);
}

#[test]
fn deterministic_differs_across_keys() {
    let e1 = encrypt_deterministic(&key(1), b"x").unwrap();
    let e2 = encrypt_deterministic(&key(2), b"x").unwrap();
    assert_ne!(e1, e2);
}

#[test]
fn deterministic_output_decrypts_with_plain_decrypt() {
    let key = key(7);
    let encrypted = encrypt_deterministic(&key, b"lookup me").unwrap();
    assert_eq!(decrypt(&key, &encrypted).unwrap(), b"lookup me");
}

#[test]
fn deterministic_base64_is_stable() {
    let key = key(9);
    let a = encrypt_deterministic(&key, b"\"u1\"").unwrap().to_base64();
    let b = encrypt_deterministic(&key, b"\"u1\"").unwrap().to_base64();
    assert_eq!(a, b);
    let opened = decrypt(&key, &EncryptedData::from_base64(&a).unwrap()).unwrap();
    assert_eq!(opened, b"\"u1\"");
}

// ── EncryptedData ────────────────────────────────────────────────

#[test]
fn encrypted_data_len_includes_nonce_and_tag() {
    let key = key(7);
    let encrypted = encrypt(&key, b"test").unwrap();
    assert_eq!(encrypted.wire_len(), NONCE_SIZE + 4 + TAG_SIZE);
}

#[test]
fn base64_roundtrip() {
    let key = key(7);
    let encrypted = encrypt(&key, b"Data").unwrap();
    let decoded = EncryptedData::from_base64(&encrypted.to_base64()).unwrap();
    assert_eq!(encrypted, decoded);
}

#[test]
fn base64_too_short_fails() {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let short = STANDARD.encode([0u8; 10]);
    assert!(EncryptedData::from_base64(&short).is_err());
}

#[test]
fn base64_invalid_fails() {
    assert!(EncryptedData::from_base64("!!!not-base64!!!").is_err());
}

// ── Unicode payloads ─────────────────────────────────────────────

#[test]
fn unicode_payload_survives_base64_storage() {
    let key = key(4);
    let plaintext = "Hello, 世界! 🌍";
    let stored = encrypt(&key, plaintext.as_bytes()).unwrap().to_base64();
    let opened = decrypt(&key, &EncryptedData::from_base64(&stored).unwrap()).unwrap();
    assert_eq!(String::from_utf8(opened).unwrap(), plaintext);
}
