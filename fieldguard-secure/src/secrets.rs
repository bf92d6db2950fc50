//! Secret providers: where the namespace secret and master key come from.
//!
//! Secrets are fetched once, when a [`SecuredInterface`](crate::SecuredInterface)
//! is constructed, and dropped after key derivation.

use crate::config::SecretSource;
use crate::error::{SecureError, SecureResult};
use std::collections::HashMap;
use std::path::PathBuf;
use zeroize::Zeroizing;

/// Secret material, zeroized on drop and redacted in `Debug`.
#[derive(Clone)]
pub struct SecretBytes(Zeroizing<Vec<u8>>);

impl SecretBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<String> for SecretBytes {
    fn from(value: String) -> Self {
        Self::new(value.into_bytes())
    }
}

impl From<&str> for SecretBytes {
    fn from(value: &str) -> Self {
        Self::new(value.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for SecretBytes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBytes([REDACTED])")
    }
}

/// Fetches named secrets.
pub trait SecretProvider: Send + Sync {
    fn fetch(&self, name: &str) -> SecureResult<SecretBytes>;
}

/// Reads secrets from environment variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretProvider;

impl SecretProvider for EnvSecretProvider {
    fn fetch(&self, name: &str) -> SecureResult<SecretBytes> {
        std::env::var(name)
            .map(SecretBytes::from)
            .map_err(|_| SecureError::config(format!("secret '{name}' not set in environment")))
    }
}

/// Reads secrets from files named after the secret, e.g. `/run/secrets/<name>`.
#[derive(Debug, Clone)]
pub struct FileSecretProvider {
    directory: PathBuf,
}

impl FileSecretProvider {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

impl SecretProvider for FileSecretProvider {
    fn fetch(&self, name: &str) -> SecureResult<SecretBytes> {
        if name.contains(['/', '\\']) || name == ".." {
            return Err(SecureError::config(format!("invalid secret name '{name}'")));
        }
        let path = self.directory.join(name);
        let contents = Zeroizing::new(std::fs::read_to_string(&path).map_err(|e| {
            SecureError::config(format!("secret '{name}' unreadable at {}: {e}", path.display()))
        })?);
        Ok(SecretBytes::from(contents.trim_end_matches(['\r', '\n'])))
    }
}

/// Fixed in-memory secrets, for tests and embedding.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretProvider {
    secrets: HashMap<String, SecretBytes>,
}

impl StaticSecretProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SecretBytes>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

impl SecretProvider for StaticSecretProvider {
    fn fetch(&self, name: &str) -> SecureResult<SecretBytes> {
        self.secrets
            .get(name)
            .cloned()
            .ok_or_else(|| SecureError::config(format!("secret '{name}' not provided")))
    }
}

/// Builds the provider a config's `[secrets]` section selects.
pub fn provider_for(source: &SecretSource) -> Box<dyn SecretProvider> {
    match source {
        SecretSource::Env => Box::new(EnvSecretProvider),
        SecretSource::File { directory } => Box::new(FileSecretProvider::new(directory.clone())),
    }
}
