//! The secured-record contract and its renderings.
//!
//! A record type declares one [`FieldSecurityConfig`] per field. The
//! [`RecordRenderer`] turns records into storage views (pseudonymous keys,
//! transformed values) and stored documents back into records.

use crate::error::{SecureError, SecureResult};
use crate::field::{FieldSecurityConfig, Strategy};
use crate::registry::SecurityRegistry;
use crate::transform::FieldTransformer;
use fieldguard_store::Document;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// A record type whose every field carries a protection contract.
///
/// Write-only fields (`BLIND`, `BUCKETED`) never come back on reads, so
/// they must be declared `Option` or `#[serde(default)]` for recovery to
/// succeed.
pub trait SecuredRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Stable kind name checked by collection policies.
    const KIND: &'static str;

    fn schema() -> RecordSchema;
}

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDeclaration {
    pub name: String,
    pub config: FieldSecurityConfig,
}

/// The per-field declarations of a record type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSchema {
    fields: Vec<FieldDeclaration>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, config: FieldSecurityConfig) -> Self {
        self.fields.push(FieldDeclaration {
            name: name.into(),
            config,
        });
        self
    }

    pub fn fields(&self) -> &[FieldDeclaration] {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldSecurityConfig> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.config)
    }

    /// Rejects duplicate names and invalid configs.
    pub fn validate(&self, kind: &str) -> SecureResult<()> {
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(SecureError::config(format!(
                    "{kind} declares field '{}' twice",
                    field.name
                )));
            }
            field.config.validate()?;
        }
        Ok(())
    }
}

/// Whether plaintext development rendering is available.
///
/// There is no way to select `InsecurePlaintextDevelopment` other than
/// naming it at interface construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderingMode {
    #[default]
    Protected,
    InsecurePlaintextDevelopment,
}

/// Renders records to and from their stored form.
#[derive(Debug, Clone)]
pub struct RecordRenderer {
    registry: Arc<SecurityRegistry>,
    transformer: Arc<FieldTransformer>,
    mode: RenderingMode,
}

impl RecordRenderer {
    pub fn new(
        registry: Arc<SecurityRegistry>,
        transformer: Arc<FieldTransformer>,
        mode: RenderingMode,
    ) -> Self {
        Self {
            registry,
            transformer,
            mode,
        }
    }

    pub fn mode(&self) -> RenderingMode {
        self.mode
    }

    /// The document persisted for `record`.
    ///
    /// `NONE` fields keep their semantic name and value. Every other field
    /// is stored under its registry token with a transformed value. Null
    /// values are omitted.
    pub fn storage_view<R: SecuredRecord>(&self, record: &R) -> SecureResult<Document> {
        let schema = R::schema();
        schema.validate(R::KIND)?;

        let mut view = Document::new();
        for (name, value) in plain_fields::<R>(record)? {
            let config = schema.get(&name).ok_or_else(|| {
                SecureError::config(format!(
                    "field '{name}' of {} has no security declaration",
                    R::KIND
                ))
            })?;
            if value.is_null() {
                continue;
            }
            let (key, stored) = self.store_field(&name, &value, config)?;
            view.insert(key, stored);
        }
        Ok(view)
    }

    /// Full plaintext rendering. Only available in development mode.
    pub fn development_view<R: SecuredRecord>(&self, record: &R) -> SecureResult<Document> {
        if self.mode != RenderingMode::InsecurePlaintextDevelopment {
            warn!(kind = R::KIND, "Development view requested in protected mode");
            return Err(SecureError::violation(format!(
                "development view of {} requires RenderingMode::InsecurePlaintextDevelopment",
                R::KIND
            )));
        }
        plain_fields::<R>(record)
    }

    /// Reverses the storage view for every recoverable field.
    ///
    /// Tokens are recomputed from field names, so documents written before
    /// a registry reset stay readable.
    pub fn read_view<R: SecuredRecord>(&self, stored: &Document) -> SecureResult<Document> {
        let schema = R::schema();
        schema.validate(R::KIND)?;

        let mut view = Document::new();
        for field in schema.fields() {
            let strategy = field.config.strategy();
            if !strategy.is_recoverable() {
                continue;
            }
            let key = self.storage_key(&field.name, &field.config)?;
            let Some(value) = stored.get(&key) else {
                continue;
            };
            let value = if strategy == Strategy::None {
                value.clone()
            } else {
                self.transformer.recover(value, &field.config)?
            };
            view.insert(field.name.clone(), value);
        }
        Ok(view)
    }

    /// Reconstructs a typed record from its stored document.
    pub fn recover<R: SecuredRecord>(&self, stored: &Document) -> SecureResult<R> {
        let view = self.read_view::<R>(stored)?;
        Ok(serde_json::from_value(Value::Object(view))?)
    }

    /// The key a field is stored under.
    pub(crate) fn storage_key(
        &self,
        name: &str,
        config: &FieldSecurityConfig,
    ) -> SecureResult<String> {
        if config.strategy() == Strategy::None {
            Ok(name.to_string())
        } else {
            self.registry.register_field(name, config)
        }
    }

    /// `(key, stored value)` for one field.
    pub(crate) fn store_field(
        &self,
        name: &str,
        value: &Value,
        config: &FieldSecurityConfig,
    ) -> SecureResult<(String, Value)> {
        let key = self.storage_key(name, config)?;
        Ok((key, self.transformer.transform(value, config)?))
    }
}

fn plain_fields<R: SecuredRecord>(record: &R) -> SecureResult<Document> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(SecureError::config(format!(
            "{} must serialize to an object, got {other}",
            R::KIND
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::KeyRing;
    use fieldguard_crypto::DerivedKey;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        title: String,
        body: String,
        #[serde(default)]
        score: Option<f64>,
    }

    impl SecuredRecord for Note {
        const KIND: &'static str = "Note";

        fn schema() -> RecordSchema {
            RecordSchema::new()
                .field("title", FieldSecurityConfig::plaintext())
                .field("body", FieldSecurityConfig::encrypted())
                .field(
                    "score",
                    FieldSecurityConfig::bucketed(vec![0.0, 5.0]).unwrap(),
                )
        }
    }

    #[derive(Serialize, Deserialize)]
    struct Undeclared {
        secret: String,
    }

    impl SecuredRecord for Undeclared {
        const KIND: &'static str = "Undeclared";

        fn schema() -> RecordSchema {
            RecordSchema::new()
        }
    }

    fn renderer(mode: RenderingMode) -> RecordRenderer {
        let root = DerivedKey::from_bytes([11; 32]);
        RecordRenderer::new(
            Arc::new(SecurityRegistry::new(&DerivedKey::from_bytes([12; 32]))),
            Arc::new(FieldTransformer::new(KeyRing::from_root(&root))),
            mode,
        )
    }

    fn note() -> Note {
        Note {
            title: "groceries".into(),
            body: "eggs".into(),
            score: Some(7.0),
        }
    }

    #[test]
    fn storage_view_hides_protected_names() {
        let view = renderer(RenderingMode::Protected).storage_view(&note()).unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(view["title"], "groceries");
        assert!(!view.contains_key("body"));
        assert!(!view.contains_key("score"));
        assert_eq!(view.keys().filter(|k| k.starts_with("f_")).count(), 2);
    }

    #[test]
    fn read_view_skips_write_only_fields() {
        let r = renderer(RenderingMode::Protected);
        let stored = r.storage_view(&note()).unwrap();
        let back: Note = r.recover(&stored).unwrap();
        assert_eq!(back.body, "eggs");
        assert_eq!(back.score, None);
    }

    #[test]
    fn null_fields_are_omitted() {
        let r = renderer(RenderingMode::Protected);
        let view = r
            .storage_view(&Note {
                score: None,
                ..note()
            })
            .unwrap();
        assert_eq!(view.len(), 2);
    }

    #[test]
    fn undeclared_fields_are_configuration_errors() {
        let r = renderer(RenderingMode::Protected);
        let err = r
            .storage_view(&Undeclared {
                secret: "s".into(),
            })
            .unwrap_err();
        assert!(matches!(err, SecureError::Configuration(_)));
    }

    #[test]
    fn development_view_is_gated() {
        let err = renderer(RenderingMode::Protected)
            .development_view(&note())
            .unwrap_err();
        assert!(err.is_violation());

        let view = renderer(RenderingMode::InsecurePlaintextDevelopment)
            .development_view(&note())
            .unwrap();
        assert_eq!(view["body"], "eggs");
    }
}
