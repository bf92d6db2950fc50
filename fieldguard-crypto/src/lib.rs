//! Cryptographic primitives for FieldGuard.
//!
//! Provides the building blocks the field transformer engine composes:
//! - Argon2id for stretching passphrase secrets into keys
//! - BLAKE3 `derive_key` for purpose-bound subkeys
//! - ChaCha20-Poly1305 for authenticated encryption, both randomized and
//!   deterministic (nonce derived from key and plaintext)
//! - Keyed BLAKE3 digests for blind indexes
//!
//! # Key handling
//!
//! Every key lives in a [`DerivedKey`], which zeroizes on drop and redacts
//! itself in `Debug` output. Callers hand keys to the functions here by
//! reference; nothing in this crate stores or returns raw key bytes beyond
//! [`DerivedKey::as_bytes`].

mod blind;
mod cipher;
mod error;
mod key;

pub use blind::{blind_index, BlindIndex};
pub use cipher::{decrypt, encrypt, encrypt_deterministic, EncryptedData, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use key::{derive_key, DerivedKey, KdfParams, Salt, KEY_SIZE, SALT_SIZE};
