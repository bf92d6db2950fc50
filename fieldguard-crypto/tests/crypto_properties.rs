//! Property-based tests for the crypto crate.
//!
//! These tests verify properties that must always hold:
//! - Both cipher modes are reversible with the correct key
//! - Deterministic mode is a function of (key, plaintext)
//! - Blind indexes are stable per key and separate across keys

use fieldguard_crypto::{blind_index, decrypt, encrypt, encrypt_deterministic, DerivedKey};
use proptest::prelude::*;

fn plaintext_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

fn key_strategy() -> impl Strategy<Value = DerivedKey> {
    prop::array::uniform32(any::<u8>()).prop_map(DerivedKey::from_bytes)
}

mod cipher_properties {
    use super::*;

    proptest! {
        #[test]
        fn randomized_roundtrip(key in key_strategy(), plaintext in plaintext_strategy()) {
            let encrypted = encrypt(&key, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&key, &encrypted).unwrap(), plaintext);
        }

        #[test]
        fn deterministic_roundtrip(key in key_strategy(), plaintext in plaintext_strategy()) {
            let encrypted = encrypt_deterministic(&key, &plaintext).unwrap();
            prop_assert_eq!(decrypt(&key, &encrypted).unwrap(), plaintext);
        }

        #[test]
        fn deterministic_is_stable(key in key_strategy(), plaintext in plaintext_strategy()) {
            let e1 = encrypt_deterministic(&key, &plaintext).unwrap();
            let e2 = encrypt_deterministic(&key, &plaintext).unwrap();
            prop_assert_eq!(e1, e2);
        }

        #[test]
        fn ciphertext_includes_auth_tag(key in key_strategy(), plaintext in plaintext_strategy()) {
            let encrypted = encrypt_deterministic(&key, &plaintext).unwrap();
            prop_assert_eq!(encrypted.ciphertext.len(), plaintext.len() + 16);
        }
    }
}

mod blind_properties {
    use super::*;

    proptest! {
        #[test]
        fn blind_index_is_stable(key in key_strategy(), plaintext in plaintext_strategy()) {
            prop_assert_eq!(blind_index(&key, &plaintext), blind_index(&key, &plaintext));
        }

        #[test]
        fn blind_index_separates_keys(
            k1 in key_strategy(),
            k2 in key_strategy(),
            plaintext in plaintext_strategy(),
        ) {
            prop_assume!(k1.as_bytes() != k2.as_bytes());
            prop_assert_ne!(blind_index(&k1, &plaintext), blind_index(&k2, &plaintext));
        }

        #[test]
        fn blind_index_hex_is_fixed_length(key in key_strategy(), plaintext in plaintext_strategy()) {
            prop_assert_eq!(blind_index(&key, &plaintext).to_hex().len(), 64);
        }
    }
}
