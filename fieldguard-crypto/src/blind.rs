//! Blind indexes: keyed one-way digests used only for equality tests.

use crate::key::DerivedKey;

/// A keyed BLAKE3 digest of some plaintext.
///
/// Equality on this type is constant-time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlindIndex(blake3::Hash);

impl BlindIndex {
    /// Hex encoding, 64 characters.
    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }
}

/// Computes the blind index of `data` under `key`.
pub fn blind_index(key: &DerivedKey, data: &[u8]) -> BlindIndex {
    BlindIndex(blake3::keyed_hash(key.as_bytes(), data))
}
