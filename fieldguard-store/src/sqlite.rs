//! SQLite-backed document store.
//!
//! Documents are stored as JSON text, one row per document, in a single
//! table keyed by `(collection, id)`. Filtering happens after decoding so
//! that token field names never need to be spliced into SQL.

use crate::{ensure_id, Document, DocumentCollection, DocumentStore, Filter, StoreError, StoreResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Persistent document store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Opens (or creates) a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "Opened SQLite document store");
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(Connection::open_in_memory()?)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS documents (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                UNIQUE(collection, id)
            );
            ",
        )?;
        Ok(())
    }

    fn handle(&self, name: &str) -> Arc<dyn DocumentCollection> {
        Arc::new(SqliteCollection {
            name: name.to_string(),
            conn: Arc::clone(&self.conn),
        })
    }
}

fn lock(conn: &Mutex<Connection>) -> StoreResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".to_string()))
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
        {
            let conn = lock(&self.conn)?;
            conn.execute(
                "INSERT OR IGNORE INTO collections (name) VALUES (?1)",
                params![name],
            )?;
        }
        debug!(collection = %name, "Ensured SQLite collection");
        Ok(self.handle(name))
    }

    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn DocumentCollection>> {
        let found: Option<String> = {
            let conn = lock(&self.conn)?;
            conn.query_row(
                "SELECT name FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?
        };
        match found {
            Some(_) => Ok(self.handle(name)),
            None => Err(StoreError::CollectionNotFound(name.to_string())),
        }
    }

    async fn list_collections(&self) -> StoreResult<Vec<String>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare("SELECT name FROM collections ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// A collection inside a [`SqliteStore`].
pub struct SqliteCollection {
    name: String,
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCollection {
    fn load(&self) -> StoreResult<Vec<Document>> {
        let conn = lock(&self.conn)?;
        let mut stmt =
            conn.prepare("SELECT body FROM documents WHERE collection = ?1 ORDER BY seq")?;
        let bodies = stmt
            .query_map(params![self.name], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| match serde_json::from_str(body)? {
                serde_json::Value::Object(map) => Ok(map),
                other => Err(StoreError::InvalidData(format!(
                    "stored document in '{}' is not an object: {other}",
                    self.name
                ))),
            })
            .collect()
    }
}

#[async_trait]
impl DocumentCollection for SqliteCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, mut document: Document) -> StoreResult<String> {
        let id = ensure_id(&mut document)?;
        let body = serde_json::to_string(&document)?;
        let conn = lock(&self.conn)?;
        let result = conn.execute(
            "INSERT INTO documents (collection, id, body) VALUES (?1, ?2, ?3)",
            params![self.name, id, body],
        );
        match result {
            Ok(_) => Ok(id),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::DuplicateId {
                    collection: self.name.clone(),
                    id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count(&self, filter: &Filter) -> StoreResult<u64> {
        if filter.is_empty() {
            let conn = lock(&self.conn)?;
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![self.name],
                |row| row.get(0),
            )?;
            return Ok(count as u64);
        }
        Ok(self.load()?.iter().filter(|d| filter.matches(d)).count() as u64)
    }

    async fn find(&self, filter: &Filter) -> StoreResult<Vec<Document>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|d| filter.matches(d))
            .collect())
    }
}
