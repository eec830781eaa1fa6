//! Retrieval backends.
//!
//! The researcher reaches documents only through [`RetrieverProvider`]:
//! it acquires a [`ScopedRetriever`] for one collection, searches it, and
//! drops it. Dropping the guard releases whatever the backend acquired.

pub mod chunk;
pub mod sqlite;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::Document;
use crate::error::{AgentError, Error, StorageError};

pub use chunk::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, chunk_documents, split_text};
pub use sqlite::{CollectionInfo, SqliteRetrieverProvider, SqliteStore};

/// Default number of documents returned per search.
pub const DEFAULT_SEARCH_K: usize = 4;
/// Default retriever backend.
pub const DEFAULT_RETRIEVER_PROVIDER: &str = "sqlite";
/// Default storage type.
pub const DEFAULT_STORAGE_TYPE: &str = "persistent";
/// Default embedding model recorded for new collections.
pub const DEFAULT_EMBEDDING_MODEL: &str = "openai/text-embedding-3-small";
/// Default database location relative to the user data directory.
const DEFAULT_DB_PATH: &str = "docqa/docqa.db";

/// Per-search options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Maximum documents to return.
    pub k: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            k: DEFAULT_SEARCH_K,
        }
    }
}

/// A retriever bound to one collection.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Returns documents matching `query`, best first.
    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Document>, AgentError>;
}

/// Factory for collection-scoped retrievers.
#[async_trait]
pub trait RetrieverProvider: Send + Sync {
    /// Backend name (e.g. `"sqlite"`).
    fn name(&self) -> &'static str;

    /// Acquires a retriever scoped to `collection`.
    async fn acquire(&self, collection: &str) -> Result<ScopedRetriever, AgentError>;

    /// Names of all known collections, sorted.
    async fn list_collections(&self) -> Result<Vec<String>, AgentError>;
}

type ReleaseFn = Box<dyn FnOnce() + Send + Sync>;

/// Guard around an acquired retriever.
///
/// The release hook runs exactly once when the guard is dropped, whether
/// or not the search succeeded.
pub struct ScopedRetriever {
    collection: String,
    inner: Box<dyn Retriever>,
    release: Option<ReleaseFn>,
}

impl ScopedRetriever {
    /// Wraps a retriever for `collection`.
    pub fn new(collection: impl Into<String>, inner: Box<dyn Retriever>) -> Self {
        Self {
            collection: collection.into(),
            inner,
            release: None,
        }
    }

    /// Registers a hook to run when the guard is dropped.
    #[must_use]
    pub fn on_release(mut self, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }

    /// Collection this retriever is scoped to.
    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Searches the scoped collection.
    ///
    /// # Errors
    ///
    /// Propagates the backend's [`AgentError::Retrieval`].
    pub async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<Document>, AgentError> {
        self.inner.search(query, options).await
    }
}

impl Drop for ScopedRetriever {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        debug!(collection = %self.collection, "retriever released");
    }
}

impl fmt::Debug for ScopedRetriever {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedRetriever")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

/// Retrieval configuration.
///
/// Resolution order: explicit value → environment variable → default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieverConfig {
    /// Backend name.
    pub provider: String,
    /// Storage type requested from the backend.
    pub storage_type: String,
    /// Embedding model recorded with new collections.
    pub embedding_model: String,
    /// Maximum chunk size for ingestion, in characters.
    pub chunk_size: usize,
    /// Chunk overlap for ingestion, in characters.
    pub chunk_overlap: usize,
    /// Documents returned per search.
    pub search_k: usize,
    /// Database file for persistent storage.
    pub database_path: Option<PathBuf>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_RETRIEVER_PROVIDER.to_string(),
            storage_type: DEFAULT_STORAGE_TYPE.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            search_k: DEFAULT_SEARCH_K,
            database_path: Self::default_database_path(),
        }
    }
}

impl RetrieverConfig {
    /// Creates configuration from `DOCQA_*` environment variables with defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok();
        let num = |name: &str| var(name).and_then(|v| v.parse().ok());

        Self {
            provider: var("DOCQA_RETRIEVER_PROVIDER").unwrap_or(defaults.provider),
            storage_type: var("DOCQA_STORAGE_TYPE").unwrap_or(defaults.storage_type),
            embedding_model: var("DOCQA_EMBEDDING_MODEL").unwrap_or(defaults.embedding_model),
            chunk_size: num("DOCQA_CHUNK_SIZE").unwrap_or(defaults.chunk_size),
            chunk_overlap: num("DOCQA_CHUNK_OVERLAP").unwrap_or(defaults.chunk_overlap),
            search_k: num("DOCQA_SEARCH_K").unwrap_or(defaults.search_k),
            database_path: var("DOCQA_DB_PATH")
                .map(PathBuf::from)
                .or(defaults.database_path),
        }
    }

    /// Search options derived from this configuration.
    #[must_use]
    pub const fn search_options(&self) -> SearchOptions {
        SearchOptions { k: self.search_k }
    }

    /// Default database path under the user data directory.
    #[must_use]
    pub fn default_database_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(DEFAULT_DB_PATH))
    }
}

/// Opens the configured retrieval backend.
///
/// # Errors
///
/// Returns [`StorageError::UnsupportedStorage`] for a storage type the
/// backend cannot serve, [`AgentError::Config`] for an unknown backend or
/// missing database path, and storage or I/O errors from opening it.
pub fn create_retriever_provider(
    config: &RetrieverConfig,
) -> Result<Arc<dyn RetrieverProvider>, Error> {
    let store = open_store(config)?;
    Ok(Arc::new(SqliteRetrieverProvider::new(store)))
}

/// Opens the document store behind the configured backend, creating the
/// database file and its parent directory if needed.
///
/// # Errors
///
/// Same as [`create_retriever_provider`].
pub fn open_store(config: &RetrieverConfig) -> Result<SqliteStore, Error> {
    match config.provider.as_str() {
        "sqlite" => {
            if config.storage_type != "persistent" {
                return Err(StorageError::UnsupportedStorage {
                    provider: config.provider.clone(),
                    storage_type: config.storage_type.clone(),
                }
                .into());
            }
            let path = config.database_path.as_ref().ok_or_else(|| {
                AgentError::config("no database path configured (set DOCQA_DB_PATH)")
            })?;
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            Ok(SqliteStore::open(path, &config.embedding_model)?)
        }
        other => Err(AgentError::config(format!("unknown retriever provider '{other}'")).into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct Empty;

    #[async_trait]
    impl Retriever for Empty {
        async fn search(
            &self,
            _query: &str,
            _options: &SearchOptions,
        ) -> Result<Vec<Document>, AgentError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_scoped_retriever_releases_on_drop() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let guard = ScopedRetriever::new("docs", Box::new(Empty)).on_release(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(guard.collection(), "docs");
        assert_eq!(released.load(Ordering::SeqCst), 0);
        drop(guard);
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_rejects_unsupported_storage() {
        let config = RetrieverConfig {
            storage_type: "ephemeral".to_string(),
            ..RetrieverConfig::default()
        };
        let result = create_retriever_provider(&config);
        assert!(matches!(
            result,
            Err(Error::Storage(StorageError::UnsupportedStorage { .. }))
        ));
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let config = RetrieverConfig {
            provider: "chroma".to_string(),
            ..RetrieverConfig::default()
        };
        assert!(matches!(
            create_retriever_provider(&config),
            Err(Error::Agent(AgentError::Config { .. }))
        ));
    }

    #[tokio::test]
    async fn test_creates_sqlite_provider() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let config = RetrieverConfig {
            database_path: Some(dir.path().join("nested").join("docqa.db")),
            ..RetrieverConfig::default()
        };
        let provider = create_retriever_provider(&config).unwrap_or_else(|_| unreachable!());
        assert_eq!(provider.name(), "sqlite");
        let collections = provider
            .list_collections()
            .await
            .unwrap_or_else(|_| unreachable!());
        assert!(collections.is_empty());
    }
}
