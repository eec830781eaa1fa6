//! `SQLite` retrieval backend.
//!
//! Collections and documents live in one database file. Search is lexical,
//! through an FTS5 index ranked by bm25. The connection sits behind a mutex
//! and async callers reach it through `spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use async_trait::async_trait;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::{debug, info};

use super::{Retriever, RetrieverProvider, ScopedRetriever, SearchOptions};
use crate::core::{Document, Metadata};
use crate::error::{AgentError, StorageError};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS collections (
    name            TEXT PRIMARY KEY,
    embedding_model TEXT NOT NULL,
    created_at      TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS documents (
    pk          INTEGER PRIMARY KEY,
    id          TEXT NOT NULL,
    collection  TEXT NOT NULL REFERENCES collections(name) ON DELETE CASCADE,
    title       TEXT NOT NULL DEFAULT '',
    content     TEXT NOT NULL,
    metadata    TEXT NOT NULL DEFAULT '{}',
    UNIQUE(collection, id)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection);

CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    title,
    content,
    content=documents,
    content_rowid=pk
);

CREATE TRIGGER IF NOT EXISTS documents_fts_insert AFTER INSERT ON documents BEGIN
    INSERT INTO documents_fts(rowid, title, content)
    VALUES (new.pk, new.title, new.content);
END;

CREATE TRIGGER IF NOT EXISTS documents_fts_delete AFTER DELETE ON documents BEGIN
    INSERT INTO documents_fts(documents_fts, rowid, title, content)
    VALUES ('delete', old.pk, old.title, old.content);
END;
";

#[allow(clippy::expect_used)]
static TERM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

/// Builds an FTS5 match expression: every word quoted, joined with `OR`.
///
/// Returns `None` when the query has no searchable terms.
fn fts_query(query: &str) -> Option<String> {
    let terms: Vec<String> = TERM_RE
        .find_iter(query)
        .map(|m| format!("\"{}\"", m.as_str()))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

/// Summary of one stored collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Embedding model recorded at creation.
    pub embedding_model: String,
    /// Creation time (UTC, `YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
    /// Number of stored documents.
    pub document_count: usize,
}

/// Handle to the document database.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    embedding_model: String,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the file cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: &Path, embedding_model: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened document database");
        Self::init(conn, embedding_model)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the schema cannot be created.
    pub fn in_memory(embedding_model: &str) -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?, embedding_model)
    }

    fn init(conn: Connection, embedding_model: &str) -> Result<Self, StorageError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            embedding_model: embedding_model.to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Creates a collection. Returns `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] on SQL failure.
    pub fn create_collection(&self, name: &str) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO collections (name, embedding_model) VALUES (?1, ?2)",
            params![name, self.embedding_model],
        )?;
        Ok(inserted > 0)
    }

    /// Whether a collection exists.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] on SQL failure.
    pub fn collection_exists(&self, name: &str) -> Result<bool, StorageError> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM collections WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Lists collections with document counts, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] on SQL failure.
    pub fn collections(&self) -> Result<Vec<CollectionInfo>, StorageError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT c.name, c.embedding_model, c.created_at, COUNT(d.pk)
             FROM collections c
             LEFT JOIN documents d ON d.collection = c.name
             GROUP BY c.name
             ORDER BY c.name",
        )?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(3)?;
            Ok(CollectionInfo {
                name: row.get(0)?,
                embedding_model: row.get(1)?,
                created_at: row.get(2)?,
                document_count: usize::try_from(count).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Stores documents in `collection`, creating it if needed.
    ///
    /// Documents whose identity already exists in the collection are
    /// skipped. Returns the number inserted.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] on SQL or metadata serialization failure.
    pub fn load_documents(&self, collection: &str, docs: &[Document]) -> Result<usize, StorageError> {
        self.create_collection(collection)?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO documents (id, collection, title, content, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for doc in docs {
                let metadata = serde_json::to_string(&doc.metadata)?;
                inserted += stmt.execute(params![
                    doc.id,
                    collection,
                    doc.title().unwrap_or_default(),
                    doc.content,
                    metadata
                ])?;
            }
        }
        tx.commit()?;

        info!(collection, offered = docs.len(), inserted, "documents loaded");
        Ok(inserted)
    }

    /// Searches one collection, best match first.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CollectionNotFound`] for an unknown
    /// collection and [`StorageError::Database`] on SQL failure.
    pub fn search(&self, collection: &str, query: &str, k: usize) -> Result<Vec<Document>, StorageError> {
        if !self.collection_exists(collection)? {
            return Err(StorageError::CollectionNotFound(collection.to_string()));
        }
        let Some(expr) = fts_query(query) else {
            return Ok(Vec::new());
        };

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT d.id, d.content, d.metadata
             FROM documents_fts f
             JOIN documents d ON d.pk = f.rowid
             WHERE documents_fts MATCH ?1 AND d.collection = ?2
             ORDER BY bm25(documents_fts)
             LIMIT ?3",
        )?;
        let limit = i64::try_from(k).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![expr, collection, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut docs = Vec::new();
        for row in rows {
            let (id, content, metadata) = row?;
            let metadata: Metadata = serde_json::from_str(&metadata)?;
            docs.push(Document::with_id(id, content, metadata));
        }
        Ok(docs)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("embedding_model", &self.embedding_model)
            .finish_non_exhaustive()
    }
}

fn retrieval_error(collection: &str, err: impl std::fmt::Display) -> AgentError {
    AgentError::Retrieval {
        collection: collection.to_string(),
        message: err.to_string(),
    }
}

/// Retriever over one collection of a [`SqliteStore`].
struct SqliteRetriever {
    store: SqliteStore,
    collection: String,
}

#[async_trait]
impl Retriever for SqliteRetriever {
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Document>, AgentError> {
        let store = self.store.clone();
        let collection = self.collection.clone();
        let query = query.to_string();
        let k = options.k;

        let docs = tokio::task::spawn_blocking(move || store.search(&collection, &query, k))
            .await
            .map_err(|e| AgentError::orchestration(format!("search task failed: {e}")))?
            .map_err(|e| retrieval_error(&self.collection, e))?;

        debug!(collection = %self.collection, results = docs.len(), "search complete");
        Ok(docs)
    }
}

/// [`RetrieverProvider`] backed by a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteRetrieverProvider {
    store: SqliteStore,
}

impl SqliteRetrieverProvider {
    /// Wraps an open store.
    #[must_use]
    pub const fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &SqliteStore {
        &self.store
    }
}

#[async_trait]
impl RetrieverProvider for SqliteRetrieverProvider {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn acquire(&self, collection: &str) -> Result<ScopedRetriever, AgentError> {
        let store = self.store.clone();
        let name = collection.to_string();
        let exists = tokio::task::spawn_blocking(move || store.collection_exists(&name))
            .await
            .map_err(|e| AgentError::orchestration(format!("acquire task failed: {e}")))?
            .map_err(|e| retrieval_error(collection, e))?;

        if !exists {
            return Err(retrieval_error(
                collection,
                StorageError::CollectionNotFound(collection.to_string()),
            ));
        }

        debug!(collection, "retriever acquired");
        Ok(ScopedRetriever::new(
            collection,
            Box::new(SqliteRetriever {
                store: self.store.clone(),
                collection: collection.to_string(),
            }),
        ))
    }

    async fn list_collections(&self) -> Result<Vec<String>, AgentError> {
        let store = self.store.clone();
        let infos = tokio::task::spawn_blocking(move || store.collections())
            .await
            .map_err(|e| AgentError::orchestration(format!("list task failed: {e}")))?
            .map_err(|e| retrieval_error("*", e))?;
        Ok(infos.into_iter().map(|c| c.name).collect())
    }
}
