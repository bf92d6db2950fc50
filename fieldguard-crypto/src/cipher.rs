//! Field encryption using ChaCha20-Poly1305.
//!
//! Two modes share one wire format (`nonce || ciphertext+tag`):
//! - [`encrypt`]: fresh random nonce per call. Repeats are indistinguishable
//!   from distinct plaintexts at rest.
//! - [`encrypt_deterministic`]: nonce is a keyed digest of the plaintext, so
//!   equal plaintexts under one key yield equal ciphertexts. Only use this
//!   where equality search is required.

use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// ChaCha20-Poly1305 nonce length (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag length appended to every ciphertext.
pub const TAG_SIZE: usize = 16;

const DETERMINISTIC_NONCE_CONTEXT: &str = "fieldguard 2024-06 deterministic nonce";

/// A sealed field value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the tag appended.
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Size of the `nonce || ciphertext` encoding before base64.
    pub fn wire_len(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    /// The string form stored in documents.
    pub fn to_base64(&self) -> String {
        let mut wire = Vec::with_capacity(self.wire_len());
        wire.extend_from_slice(&self.nonce);
        wire.extend_from_slice(&self.ciphertext);
        STANDARD.encode(wire)
    }

    /// Parses [`to_base64`](Self::to_base64) output. Anything shorter than
    /// a nonce plus a tag cannot be a sealed value.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        let wire = STANDARD
            .decode(encoded)
            .map_err(|e| CryptoError::Decryption(format!("invalid base64: {e}")))?;
        if wire.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Decryption(format!(
                "sealed value is {} bytes, need at least {}",
                wire.len(),
                NONCE_SIZE + TAG_SIZE
            )));
        }
        let (nonce, ciphertext) = wire.split_at(NONCE_SIZE);
        let mut fixed = [0u8; NONCE_SIZE];
        fixed.copy_from_slice(nonce);
        Ok(Self {
            nonce: fixed,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

fn aead(key: &DerivedKey) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(key.as_bytes().into())
}

fn seal(key: &DerivedKey, nonce: [u8; NONCE_SIZE], plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let ciphertext = aead(key)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    Ok(EncryptedData { nonce, ciphertext })
}

/// Seals `plaintext` under a fresh random nonce.
pub fn encrypt(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    seal(key, nonce, plaintext)
}

/// Seals `plaintext` under a nonce derived from `key` and `plaintext`.
///
/// The nonce key is a subkey of `key`, so the nonce reveals nothing about
/// the plaintext beyond equality with other outputs under the same key.
pub fn encrypt_deterministic(key: &DerivedKey, plaintext: &[u8]) -> CryptoResult<EncryptedData> {
    let nonce_key = key.derive_subkey(DETERMINISTIC_NONCE_CONTEXT);
    let digest = blake3::keyed_hash(nonce_key.as_bytes(), plaintext);
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest.as_bytes()[..NONCE_SIZE]);
    seal(key, nonce, plaintext)
}

/// Opens a value sealed by either mode.
pub fn decrypt(key: &DerivedKey, sealed: &EncryptedData) -> CryptoResult<Vec<u8>> {
    aead(key)
        .decrypt(Nonce::from_slice(&sealed.nonce), sealed.ciphertext.as_slice())
        .map_err(|_| CryptoError::Decryption("wrong key or tampered value".to_string()))
}
