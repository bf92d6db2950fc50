//! Deterministic field-name pseudonymization.
//!
//! A field's token is a keyed digest of its name under the namespace key.
//! Tokens are recomputed, never remembered: losing the in-memory table
//! loses nothing, because the namespace secret and the field name give the
//! same token again. The table only exists for reverse lookup, export and
//! auditing.

use crate::error::{SecureError, SecureResult};
use crate::field::FieldSecurityConfig;
use fieldguard_crypto::DerivedKey;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

const TOKEN_CONTEXT: &str = "fieldguard 2024-06 field name token";
const FINGERPRINT_CONTEXT: &str = "fieldguard 2024-06 registry fingerprint";
const TOKEN_PREFIX: &str = "f_";
const TOKEN_HEX_LEN: usize = 24;

/// One `(name, token, config)` mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    pub token: String,
    #[serde(default)]
    pub config: Option<FieldSecurityConfig>,
}

/// Exported registry state.
///
/// `fingerprint` identifies the namespace without revealing its secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub fingerprint: String,
    pub entries: Vec<RegistryEntry>,
}

#[derive(Default)]
struct RegistryState {
    by_name: BTreeMap<String, RegistryEntry>,
    by_token: HashMap<String, String>,
}

impl RegistryState {
    fn insert(&mut self, entry: RegistryEntry) {
        self.by_token.insert(entry.token.clone(), entry.name.clone());
        self.by_name.insert(entry.name.clone(), entry);
    }
}

/// The semantic-name ↔ token directory for one namespace.
pub struct SecurityRegistry {
    token_key: DerivedKey,
    fingerprint: String,
    state: RwLock<RegistryState>,
}

impl SecurityRegistry {
    /// Creates an empty registry for the namespace keyed by `namespace`.
    pub fn new(namespace: &DerivedKey) -> Self {
        let fingerprint_key = namespace.derive_subkey(FINGERPRINT_CONTEXT);
        let fingerprint = blake3::hash(fingerprint_key.as_bytes()).to_hex()[..16].to_string();
        Self {
            token_key: namespace.derive_subkey(TOKEN_CONTEXT),
            fingerprint,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// Rebuilds a registry from a snapshot.
    ///
    /// Every entry is verified against recomputation under `namespace`; a
    /// snapshot from another namespace is rejected outright.
    pub fn from_export(snapshot: RegistrySnapshot, namespace: &DerivedKey) -> SecureResult<Self> {
        let registry = Self::new(namespace);
        registry.import(snapshot)?;
        Ok(registry)
    }

    /// Identifies this registry's namespace.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Computes `name`'s token without touching the table.
    pub fn derive_token(&self, name: &str) -> String {
        let digest = blake3::keyed_hash(self.token_key.as_bytes(), name.as_bytes());
        format!("{TOKEN_PREFIX}{}", &digest.to_hex()[..TOKEN_HEX_LEN])
    }

    /// Returns `name`'s token, recording the mapping on first use.
    ///
    /// Concurrent first uses of one name agree: the token is a pure
    /// function of the name, and the insert is an entry-or-keep under the
    /// write lock.
    pub fn get_or_create_token(&self, name: &str) -> String {
        if let Some(entry) = self.read().by_name.get(name) {
            return entry.token.clone();
        }

        let token = self.derive_token(name);
        let mut state = self.write();
        if let Some(entry) = state.by_name.get(name) {
            return entry.token.clone();
        }
        debug!(token = %token, "Registered field token");
        state.insert(RegistryEntry {
            name: name.to_string(),
            token: token.clone(),
            config: None,
        });
        token
    }

    /// Records `name` with its protection contract and returns its token.
    ///
    /// A name may only ever carry one contract: the same token under two
    /// strategies would make stored values ambiguous.
    pub fn register_field(&self, name: &str, config: &FieldSecurityConfig) -> SecureResult<String> {
        if let Some(entry) = self.read().by_name.get(name) {
            if entry.config.as_ref() == Some(config) {
                return Ok(entry.token.clone());
            }
        }

        let mut state = self.write();
        let token = match state.by_name.get_mut(name) {
            Some(entry) => match &entry.config {
                Some(existing) if existing != config => {
                    return Err(SecureError::config(format!(
                        "field '{name}' is already registered as {} and cannot be redeclared as {}",
                        existing.strategy(),
                        config.strategy()
                    )));
                }
                _ => {
                    entry.config = Some(config.clone());
                    entry.token.clone()
                }
            },
            None => {
                let token = self.derive_token(name);
                debug!(token = %token, strategy = %config.strategy(), "Registered field");
                state.insert(RegistryEntry {
                    name: name.to_string(),
                    token: token.clone(),
                    config: Some(config.clone()),
                });
                token
            }
        };
        Ok(token)
    }

    /// Looks up the semantic name behind `token`.
    pub fn resolve_name(&self, token: &str) -> SecureResult<String> {
        self.read()
            .by_token
            .get(token)
            .cloned()
            .ok_or_else(|| SecureError::NotFound(format!("unknown field token '{token}'")))
    }

    /// The recorded token for `name`, if it has been used.
    pub fn token_for(&self, name: &str) -> Option<String> {
        self.read().by_name.get(name).map(|e| e.token.clone())
    }

    /// The recorded contract for `name`, if one was registered.
    pub fn config_for(&self, name: &str) -> Option<FieldSecurityConfig> {
        self.read().by_name.get(name).and_then(|e| e.config.clone())
    }

    /// Number of recorded mappings.
    pub fn len(&self) -> usize {
        self.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every mapping, ordered by name.
    pub fn export(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            fingerprint: self.fingerprint.clone(),
            entries: self.read().by_name.values().cloned().collect(),
        }
    }

    /// Merges a snapshot into this registry, returning how many entries it held.
    pub fn import(&self, snapshot: RegistrySnapshot) -> SecureResult<usize> {
        if snapshot.fingerprint != self.fingerprint {
            return Err(SecureError::config(format!(
                "registry snapshot belongs to namespace {}, not {}",
                snapshot.fingerprint, self.fingerprint
            )));
        }

        let mut declared: HashMap<&str, &FieldSecurityConfig> = HashMap::new();
        for entry in &snapshot.entries {
            let expected = self.derive_token(&entry.name);
            if entry.token != expected {
                return Err(SecureError::config(format!(
                    "snapshot token for '{}' does not match its derivation",
                    entry.name
                )));
            }
            let Some(config) = &entry.config else { continue };
            config.validate()?;
            if let Some(first) = declared.insert(&entry.name, config) {
                if first != config {
                    return Err(SecureError::config(format!(
                        "snapshot declares field '{}' twice with different contracts",
                        entry.name
                    )));
                }
            }
        }

        let count = snapshot.entries.len();
        let mut state = self.write();
        // Nothing is merged unless every entry agrees with the current state.
        for (name, config) in &declared {
            if let Some(existing) = state.by_name.get(*name).and_then(|e| e.config.as_ref()) {
                if existing != *config {
                    return Err(SecureError::config(format!(
                        "snapshot redeclares field '{name}' (registered as {})",
                        existing.strategy()
                    )));
                }
            }
        }
        drop(declared);
        for entry in snapshot.entries {
            let keep_config = state
                .by_name
                .get(&entry.name)
                .and_then(|existing| existing.config.clone());
            state.insert(RegistryEntry {
                config: entry.config.or(keep_config),
                ..entry
            });
        }
        info!(entries = count, "Imported registry snapshot");
        Ok(count)
    }

    /// Writes the current snapshot to `path` as JSON.
    pub fn save_snapshot(&self, path: &Path) -> SecureResult<()> {
        let json = serde_json::to_string_pretty(&self.export())?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved registry snapshot");
        Ok(())
    }

    /// Reads a snapshot file written by [`save_snapshot`](Self::save_snapshot).
    pub fn load_snapshot(path: &Path) -> SecureResult<RegistrySnapshot> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SecurityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityRegistry")
            .field("fingerprint", &self.fingerprint)
            .field("entries", &self.len())
            .finish()
    }
}
