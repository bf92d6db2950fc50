//! The transformer engine: value-level obfuscation and recovery per strategy.
//!
//! | Strategy | Stored form | Recoverable |
//! |---|---|---|
//! | `NONE`, `TOKEN_ONLY` | value unchanged | yes |
//! | `DETERMINISTIC` | base64(nonce ‖ ciphertext), nonce keyed on plaintext | yes |
//! | `BLIND` | 64 hex chars, keyed BLAKE3 | no |
//! | `BUCKETED` | `{min, max, label}` | no |
//! | `TEMPORAL_OFFSET` | RFC 3339 UTC, truncated then shifted | yes |
//! | `ENCRYPTED` | base64(nonce ‖ ciphertext), random nonce | yes |
//!
//! Ciphers and digests consume the canonical JSON encoding of the value,
//! so `"1"` and `1` never collide.

mod bucket;
mod temporal;

pub use bucket::{bucket_for, Bucket};

use crate::error::{SecureError, SecureResult};
use crate::field::{FieldSecurityConfig, Strategy, TemporalPrecision};
use crate::keyring::KeyRing;
use chrono::{DateTime, FixedOffset, Utc};
use fieldguard_crypto::{
    blind_index, decrypt, encrypt, encrypt_deterministic, DerivedKey, EncryptedData,
};
use serde_json::Value;

/// Applies field strategies using keys it never hands out.
///
/// Every method is a pure function of `(value, config, keys)`; the engine
/// is safe to share across threads and call concurrently.
#[derive(Debug)]
pub struct FieldTransformer {
    keys: KeyRing,
}

impl FieldTransformer {
    pub fn new(keys: KeyRing) -> Self {
        Self { keys }
    }

    /// Obfuscates `value` for storage under `config`.
    pub fn transform(&self, value: &Value, config: &FieldSecurityConfig) -> SecureResult<Value> {
        match config.strategy() {
            Strategy::None | Strategy::TokenOnly => Ok(value.clone()),
            Strategy::Deterministic => {
                let plaintext = serde_json::to_vec(value)?;
                let sealed = encrypt_deterministic(self.keys.deterministic(), &plaintext)?;
                Ok(Value::String(sealed.to_base64()))
            }
            Strategy::Encrypted => {
                let plaintext = serde_json::to_vec(value)?;
                let sealed = encrypt(self.keys.encryption(), &plaintext)?;
                Ok(Value::String(sealed.to_base64()))
            }
            Strategy::Blind => {
                let plaintext = serde_json::to_vec(value)?;
                Ok(Value::String(blind_index(self.keys.blind(), &plaintext).to_hex()))
            }
            Strategy::Bucketed => {
                let boundaries = config.buckets().unwrap_or_default();
                let bucket = bucket_for(bucket::numeric(value)?, boundaries)?;
                Ok(serde_json::to_value(bucket)?)
            }
            Strategy::TemporalOffset => {
                let text = value.as_str().ok_or_else(|| {
                    SecureError::config(format!(
                        "TEMPORAL_OFFSET fields require an RFC 3339 string, got {value}"
                    ))
                })?;
                let instant = temporal::parse_aware(text)?;
                let shifted = self.transform_instant(instant, config.temporal_precision())?;
                Ok(Value::String(temporal::format(shifted)))
            }
        }
    }

    /// Reverses [`transform`](Self::transform) for recoverable strategies.
    pub fn recover(&self, stored: &Value, config: &FieldSecurityConfig) -> SecureResult<Value> {
        match config.strategy() {
            Strategy::None | Strategy::TokenOnly => Ok(stored.clone()),
            Strategy::Deterministic => {
                self.open(self.keys.deterministic(), stored, Strategy::Deterministic)
            }
            Strategy::Encrypted => self.open(self.keys.encryption(), stored, Strategy::Encrypted),
            strategy @ (Strategy::Blind | Strategy::Bucketed) => {
                Err(SecureError::NotRecoverable(strategy))
            }
            Strategy::TemporalOffset => {
                let text = stored_str(stored, Strategy::TemporalOffset)?;
                let shifted = temporal::parse_aware(text)?.with_timezone(&Utc);
                Ok(Value::String(temporal::format(self.recover_instant(shifted)?)))
            }
        }
    }

    /// Typed form of the `TEMPORAL_OFFSET` transform.
    pub fn transform_instant(
        &self,
        instant: DateTime<FixedOffset>,
        precision: Option<TemporalPrecision>,
    ) -> SecureResult<DateTime<Utc>> {
        temporal::shift(instant, precision, self.keys.temporal_offset())
    }

    /// Typed form of the `TEMPORAL_OFFSET` recovery.
    pub fn recover_instant(&self, shifted: DateTime<Utc>) -> SecureResult<DateTime<Utc>> {
        temporal::unshift(shifted, self.keys.temporal_offset())
    }

    fn open(&self, key: &DerivedKey, stored: &Value, strategy: Strategy) -> SecureResult<Value> {
        let encoded = stored_str(stored, strategy)?;
        let sealed = EncryptedData::from_base64(encoded)?;
        let plaintext = decrypt(key, &sealed)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

fn stored_str(stored: &Value, strategy: Strategy) -> SecureResult<&str> {
    stored.as_str().ok_or_else(|| {
        SecureError::config(format!("stored {strategy} value is not a string: {stored}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine(seed: u8) -> FieldTransformer {
        FieldTransformer::new(KeyRing::from_root(&DerivedKey::from_bytes([seed; 32])))
    }

    #[test]
    fn passthrough_strategies() {
        let e = engine(1);
        let v = json!({"nested": [1, 2]});
        assert_eq!(e.transform(&v, &FieldSecurityConfig::plaintext()).unwrap(), v);
        assert_eq!(e.transform(&v, &FieldSecurityConfig::token_only()).unwrap(), v);
    }

    #[test]
    fn deterministic_is_stable_and_recoverable() {
        let e = engine(1);
        let config = FieldSecurityConfig::deterministic();
        let a = e.transform(&json!("a@b.com"), &config).unwrap();
        let b = e.transform(&json!("a@b.com"), &config).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, json!("a@b.com"));
        assert_eq!(e.recover(&a, &config).unwrap(), json!("a@b.com"));
    }

    #[test]
    fn deterministic_distinguishes_json_types() {
        let e = engine(1);
        let config = FieldSecurityConfig::deterministic();
        assert_ne!(
            e.transform(&json!("1"), &config).unwrap(),
            e.transform(&json!(1), &config).unwrap()
        );
    }

    #[test]
    fn encrypted_is_randomized_and_recoverable() {
        let e = engine(2);
        let config = FieldSecurityConfig::encrypted();
        let a = e.transform(&json!(42), &config).unwrap();
        let b = e.transform(&json!(42), &config).unwrap();
        assert_ne!(a, b);
        assert_eq!(e.recover(&a, &config).unwrap(), json!(42));
        assert_eq!(e.recover(&b, &config).unwrap(), json!(42));
    }

    #[test]
    fn encrypted_fails_under_another_key() {
        let config = FieldSecurityConfig::encrypted();
        let stored = engine(3).transform(&json!("x"), &config).unwrap();
        assert!(matches!(
            engine(4).recover(&stored, &config),
            Err(SecureError::Crypto(_))
        ));
    }

    #[test]
    fn blind_is_fixed_length_and_key_separated() {
        let config = FieldSecurityConfig::blind();
        let a = engine(5).transform(&json!("p"), &config).unwrap();
        let b = engine(6).transform(&json!("p"), &config).unwrap();
        assert_eq!(a.as_str().unwrap().len(), 64);
        assert_ne!(a, b);
        assert_eq!(a, engine(5).transform(&json!("p"), &config).unwrap());
    }

    #[test]
    fn write_only_strategies_do_not_recover() {
        let e = engine(7);
        let blind = FieldSecurityConfig::blind();
        let stored = e.transform(&json!("p"), &blind).unwrap();
        assert!(matches!(
            e.recover(&stored, &blind),
            Err(SecureError::NotRecoverable(Strategy::Blind))
        ));

        let bucketed = FieldSecurityConfig::bucketed(vec![0.0, 10.0]).unwrap();
        let stored = e.transform(&json!(3), &bucketed).unwrap();
        assert!(matches!(
            e.recover(&stored, &bucketed),
            Err(SecureError::NotRecoverable(Strategy::Bucketed))
        ));
    }

    #[test]
    fn bucketed_output_shape() {
        let e = engine(8);
        let config = FieldSecurityConfig::bucketed(vec![0.0, 10.0, 20.0]).unwrap();
        assert_eq!(
            e.transform(&json!(9.999), &config).unwrap(),
            json!({"min": 0.0, "max": 10.0, "label": "[0, 10)"})
        );
        assert!(matches!(
            e.transform(&json!("nine"), &config),
            Err(SecureError::Configuration(_))
        ));
    }

    #[test]
    fn temporal_roundtrip() {
        let e = engine(9);
        let config = FieldSecurityConfig::temporal_offset();
        let stored = e.transform(&json!("2024-03-01T12:30:45.123456+02:00"), &config).unwrap();
        assert_ne!(stored, json!("2024-03-01T10:30:45.123456Z"));
        assert_eq!(
            e.recover(&stored, &config).unwrap(),
            json!("2024-03-01T10:30:45.123456Z")
        );
    }

    #[test]
    fn temporal_rejects_naive_and_non_strings() {
        let e = engine(9);
        let config = FieldSecurityConfig::temporal_offset();
        assert!(e.transform(&json!("2024-03-01T12:30:45"), &config).is_err());
        assert!(e.transform(&json!(1_700_000_000), &config).is_err());
    }

    #[test]
    fn temporal_precision_truncates() {
        let e = engine(10);
        let config = FieldSecurityConfig::temporal_offset_with_precision("day").unwrap();
        let stored = e.transform(&json!("2024-03-01T23:59:59Z"), &config).unwrap();
        assert_eq!(
            e.recover(&stored, &config).unwrap(),
            json!("2024-03-01T00:00:00Z")
        );
    }
}
