//! Key material held by the transformer engine.

use crate::error::{SecureError, SecureResult};
use crate::secrets::SecretBytes;
use chrono::TimeDelta;
use fieldguard_crypto::{derive_key, DerivedKey, KdfParams, Salt};

const DETERMINISTIC_CONTEXT: &str = "fieldguard 2024-06 deterministic field cipher";
const BLIND_CONTEXT: &str = "fieldguard 2024-06 blind index";
const ENCRYPTION_CONTEXT: &str = "fieldguard 2024-06 randomized field cipher";
const TEMPORAL_CONTEXT: &str = "fieldguard 2024-06 temporal offset";

const MILLIS_PER_YEAR: u64 = 365 * 24 * 60 * 60 * 1000;

/// Purpose-bound keys derived from one root key.
///
/// Nothing outside the crate can read the keys back.
pub struct KeyRing {
    deterministic: DerivedKey,
    blind: DerivedKey,
    encryption: DerivedKey,
    temporal_offset: TimeDelta,
}

impl KeyRing {
    /// Derives every purpose key from `root`.
    pub fn from_root(root: &DerivedKey) -> Self {
        let temporal = root.derive_subkey(TEMPORAL_CONTEXT);
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&temporal.as_bytes()[..8]);
        // Between one and fifty years, millisecond granularity.
        let span = 49 * MILLIS_PER_YEAR;
        let millis = MILLIS_PER_YEAR + u64::from_le_bytes(raw) % span;

        Self {
            deterministic: root.derive_subkey(DETERMINISTIC_CONTEXT),
            blind: root.derive_subkey(BLIND_CONTEXT),
            encryption: root.derive_subkey(ENCRYPTION_CONTEXT),
            temporal_offset: TimeDelta::milliseconds(millis as i64),
        }
    }

    pub(crate) fn deterministic(&self) -> &DerivedKey {
        &self.deterministic
    }

    pub(crate) fn blind(&self) -> &DerivedKey {
        &self.blind
    }

    pub(crate) fn encryption(&self) -> &DerivedKey {
        &self.encryption
    }

    pub(crate) fn temporal_offset(&self) -> TimeDelta {
        self.temporal_offset
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing").field("keys", &"[REDACTED]").finish()
    }
}

/// Turns a fetched secret into a root key.
///
/// 64 hex characters are taken as a raw 256-bit key. Anything else is a
/// passphrase, stretched with Argon2id under a salt derived from `label`
/// so every deployment re-derives the same key.
pub(crate) fn key_from_secret(
    secret: &SecretBytes,
    label: &str,
    params: &KdfParams,
) -> SecureResult<DerivedKey> {
    let text = std::str::from_utf8(secret.as_bytes())
        .map_err(|_| SecureError::config(format!("secret '{label}' is not valid UTF-8")))?
        .trim();

    if text.is_empty() {
        return Err(SecureError::config(format!("secret '{label}' is empty")));
    }
    if text.len() == 64 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Ok(DerivedKey::from_hex(text)?);
    }
    Ok(derive_key(text, &Salt::from_label(label), params)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn hex_secrets_are_raw_keys() {
        let secret = SecretBytes::from("ab".repeat(32));
        let key = key_from_secret(&secret, "ns", &fast_params()).unwrap();
        assert_eq!(*key.as_bytes(), [0xAB; 32]);
    }

    #[test]
    fn passphrases_are_stretched_per_label() {
        let secret = SecretBytes::from("correct horse battery staple");
        let a = key_from_secret(&secret, "namespace", &fast_params()).unwrap();
        let b = key_from_secret(&secret, "namespace", &fast_params()).unwrap();
        let c = key_from_secret(&secret, "master", &fast_params()).unwrap();
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }

    #[test]
    fn empty_secret_is_rejected() {
        let secret = SecretBytes::from("  \n");
        assert!(key_from_secret(&secret, "ns", &fast_params()).is_err());
    }

    #[test]
    fn temporal_offset_spans_years() {
        let ring = KeyRing::from_root(&DerivedKey::from_bytes([7; 32]));
        let days = ring.temporal_offset().num_days();
        assert!((365..50 * 365).contains(&days), "offset was {days} days");
    }

    #[test]
    fn purpose_keys_are_distinct() {
        let ring = KeyRing::from_root(&DerivedKey::from_bytes([9; 32]));
        assert_ne!(ring.deterministic().as_bytes(), ring.blind().as_bytes());
        assert_ne!(ring.blind().as_bytes(), ring.encryption().as_bytes());
        assert!(format!("{ring:?}").contains("REDACTED"));
    }
}
