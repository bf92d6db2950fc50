//! In-process document store.

use crate::{ensure_id, Document, DocumentCollection, DocumentStore, Filter, StoreError, StoreResult, ID_FIELD};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A document store held entirely in memory.
///
/// `simulate_outage` makes every write fail with [`StoreError::Unavailable`],
/// which lets callers exercise store-failure paths without a real database.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Arc<MemoryCollection>>>,
    outage: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles write failures for every collection in this store.
    pub fn simulate_outage(&self, down: bool) {
        self.outage.store(down, Ordering::SeqCst);
    }

    /// Returns a collection's raw documents, bypassing the driver contract.
    ///
    /// Meant for inspecting what actually reached storage.
    pub async fn raw_documents(&self, name: &str) -> Vec<Document> {
        match self.collections.read().await.get(name) {
            Some(collection) => collection.documents.read().await.clone(),
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
        let mut collections = self.collections.write().await;
        let collection: Arc<dyn DocumentCollection> = collections
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(collection = %name, "Created in-memory collection");
                Arc::new(MemoryCollection {
                    name: name.to_string(),
                    documents: RwLock::new(Vec::new()),
                    outage: Arc::clone(&self.outage),
                })
            })
            .clone();
        Ok(collection)
    }

    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
        self.collections
            .read()
            .await
            .get(name)
            .cloned()
            .map(|c| c as Arc<dyn DocumentCollection>)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }
}

/// A collection inside a [`MemoryStore`].
pub struct MemoryCollection {
    name: String,
    documents: RwLock<Vec<Document>>,
    outage: Arc<AtomicBool>,
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, mut document: Document) -> StoreResult<String> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "collection '{}' is not accepting writes",
                self.name
            )));
        }

        let id = ensure_id(&mut document)?;
        let mut documents = self.documents.write().await;
        let duplicate = documents
            .iter()
            .any(|d| d.get(ID_FIELD).and_then(|v| v.as_str()) == Some(id.as_str()));
        if duplicate {
            return Err(StoreError::DuplicateId {
                collection: self.name.clone(),
                id,
            });
        }
        documents.push(document);
        Ok(id)
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        let documents = self.documents.read().await;
        Ok(documents.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect())
    }
}
