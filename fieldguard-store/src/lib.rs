//! Document store driver contract for FieldGuard.
//!
//! The secured layer consumes a document database only through the two
//! traits defined here:
//! - [`DocumentStore`]: create or look up collections by name
//! - [`DocumentCollection`]: single insert, count, existence check, and
//!   an equality-filter query entry point
//!
//! The contract deliberately has no update, replace, delete or bulk
//! primitives. Two drivers ship with the crate:
//! - [`MemoryStore`]: process-local, used in tests and embedding
//! - [`SqliteStore`]: SQLite-backed, documents kept as JSON text

mod error;
mod filter;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use filter::Filter;
pub use memory::{MemoryCollection, MemoryStore};
pub use sqlite::{SqliteCollection, SqliteStore};

use async_trait::async_trait;
use std::sync::Arc;

/// A stored document: a JSON object keyed by field name or token.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Field holding the store-assigned document id.
pub const ID_FIELD: &str = "_id";

/// Returns the id already present on `document`, or assigns a fresh UUID v7.
pub(crate) fn ensure_id(document: &mut Document) -> StoreResult<String> {
    match document.get(ID_FIELD) {
        Some(serde_json::Value::String(id)) => Ok(id.clone()),
        Some(other) => Err(StoreError::InvalidData(format!(
            "{ID_FIELD} must be a string, got {other}"
        ))),
        None => {
            let id = uuid::Uuid::now_v7().to_string();
            document.insert(ID_FIELD.to_string(), serde_json::Value::String(id.clone()));
            Ok(id)
        }
    }
}

/// One named collection of documents.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// The collection's name.
    fn name(&self) -> &str;

    /// Persists a single document, returning its id.
    async fn insert_one(&self, document: Document) -> StoreResult<String>;

    /// Counts documents matching `filter`.
    async fn count(&self, filter: &Filter) -> StoreResult<u64>;

    /// Whether any document matches `filter`.
    async fn exists(&self, filter: &Filter) -> StoreResult<bool> {
        Ok(self.count(filter).await? > 0)
    }

    /// Returns every document matching `filter`, in insertion order.
    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>>;
}

/// A document database holding named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates the collection if needed and returns a handle to it.
    async fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>>;

    /// Returns an existing collection, or `CollectionNotFound`.
    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>>;

    /// Names of all collections.
    async fn list_collections(&self) -> StoreResult<Vec<String>>;
}
