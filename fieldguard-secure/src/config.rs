//! Startup configuration, read from `fieldguard.toml`.
//!
//! Only secret *names* live here, never secret values. There is
//! intentionally no switch for plaintext development rendering: that mode
//! is only reachable through [`SecuredInterface::with_rendering`](crate::SecuredInterface::with_rendering).

use crate::error::{SecureError, SecureResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Where secrets are fetched from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretSource {
    /// Environment variables named after the secret.
    #[default]
    Env,
    /// Files named after the secret inside `directory`.
    File { directory: PathBuf },
}

/// Parsed configuration for a secured interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Name of the secret keying the field-name registry.
    pub namespace_secret: String,
    /// Name of the secret all field keys are derived from.
    pub master_key_secret: String,
    /// Registry snapshot loaded by `initialize` and written by `persist_registry`.
    pub registry_snapshot: Option<PathBuf>,
    pub secrets: SecretSource,
}

fn default_namespace_secret() -> String {
    "FIELDGUARD_NAMESPACE_SECRET".to_string()
}

fn default_master_key_secret() -> String {
    "FIELDGUARD_MASTER_KEY".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            namespace_secret: default_namespace_secret(),
            master_key_secret: default_master_key_secret(),
            registry_snapshot: None,
            secrets: SecretSource::Env,
        }
    }
}

impl SecurityConfig {
    /// Loads configuration from a TOML file.
    ///
    /// Unlike optional settings elsewhere, a missing or malformed file is an
    /// error: falling back to defaults could silently select the wrong keys.
    pub fn load_from(path: &Path) -> SecureResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            SecureError::config(format!("failed to read config {}: {e}", path.display()))
        })?;
        let config = Self::from_toml(&contents)?;
        info!(path = %path.display(), "Loaded security configuration");
        Ok(config)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(contents: &str) -> SecureResult<Self> {
        let file: ConfigFile = toml::from_str(contents)
            .map_err(|e| SecureError::config(format!("invalid security config: {e}")))?;
        file.into_config()
    }
}

/// Raw TOML structure matching the `fieldguard.toml` format.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    security: SecuritySection,
    #[serde(default)]
    secrets: SecretsSection,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SecuritySection {
    #[serde(default = "default_namespace_secret")]
    namespace_secret: String,
    #[serde(default = "default_master_key_secret")]
    master_key_secret: String,
    #[serde(default)]
    registry_snapshot: Option<PathBuf>,
}

impl Default for SecuritySection {
    fn default() -> Self {
        Self {
            namespace_secret: default_namespace_secret(),
            master_key_secret: default_master_key_secret(),
            registry_snapshot: None,
        }
    }
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct SecretsSection {
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    directory: Option<PathBuf>,
}

impl ConfigFile {
    fn into_config(self) -> SecureResult<SecurityConfig> {
        let secrets = match self.secrets.source.as_deref().unwrap_or("env") {
            "env" => SecretSource::Env,
            "file" => SecretSource::File {
                directory: self.secrets.directory.ok_or_else(|| {
                    SecureError::config("secrets.source = \"file\" requires secrets.directory")
                })?,
            },
            other => {
                return Err(SecureError::config(format!(
                    "unknown secrets.source '{other}' (expected \"env\" or \"file\")"
                )));
            }
        };

        if self.security.namespace_secret == self.security.master_key_secret {
            return Err(SecureError::config(
                "namespace_secret and master_key_secret must name different secrets",
            ));
        }

        Ok(SecurityConfig {
            namespace_secret: self.security.namespace_secret,
            master_key_secret: self.security.master_key_secret,
            registry_snapshot: self.security.registry_snapshot,
            secrets,
        })
    }
}
