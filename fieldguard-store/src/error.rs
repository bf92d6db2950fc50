//! Error types for the storage layer.

use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in storage operations.
///
/// None of these carry security meaning: they describe the backing store
/// failing, never a caller being refused.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Collection has not been created.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// A document with this id already exists in the collection.
    #[error("duplicate document id '{id}' in collection '{collection}'")]
    DuplicateId { collection: String, id: String },

    /// The store refused the request (offline, read-only, lock poisoned).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
