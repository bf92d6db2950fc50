//! Error taxonomy for the secured data-access layer.

use crate::field::Strategy;
use fieldguard_crypto::CryptoError;
use fieldguard_store::StoreError;
use thiserror::Error;

/// Result type for secured operations.
pub type SecureResult<T> = Result<T, SecureError>;

/// Errors raised by the secured layer.
///
/// `SecurityViolation` and `Store` are never conflated: a store failure
/// after a successful security check keeps its own variant and counter.
#[derive(Debug, Error)]
pub enum SecureError {
    /// Caller bug detected at construction or use time (empty bucket list,
    /// unknown precision, non-numeric input, naive timestamp, ...).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Attempted bypass or inadmissible write.
    #[error("security violation: {0}")]
    SecurityViolation(String),

    /// Unknown token on reverse lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// Recovery requested for a write-only strategy.
    #[error("{0} fields are write-only and cannot be recovered")]
    NotRecoverable(Strategy),

    /// The document store failed after the security checks passed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SecureError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn violation(message: impl Into<String>) -> Self {
        Self::SecurityViolation(message.into())
    }

    /// Whether this error is a security violation.
    pub fn is_violation(&self) -> bool {
        matches!(self, Self::SecurityViolation(_))
    }

    /// Whether this error came from the document store.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Store(_))
    }
}
