//! Error types for docqa.
//!
//! Each layer has its own `thiserror` enum; [`Error`] wraps them for the
//! CLI and library entry points.

use thiserror::Error;

/// Convenience alias used by the CLI and library entry points.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Orchestration, provider, or leaf-capability failure.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// Retrieval backend storage failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// CLI command failure.
    #[error(transparent)]
    Command(#[from] CommandError),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while running a conversation turn.
///
/// Every variant aborts the turn. The core never retries.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No API key found in configuration or environment.
    #[error("no API key configured (set OPENAI_API_KEY or DOCQA_API_KEY)")]
    ApiKeyMissing,

    /// Model identifier names a provider that is not supported.
    #[error("unsupported LLM provider: {name}")]
    UnsupportedProvider {
        /// Provider prefix from the model identifier.
        name: String,
    },

    /// The provider rejected or failed the request.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Provider error message.
        message: String,
        /// HTTP status, when known.
        status: Option<u16>,
    },

    /// A structured model reply did not match its target schema.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong.
        message: String,
        /// Raw reply content.
        content: String,
    },

    /// A leaf capability broke its contract (e.g. missing direct response).
    #[error("contract violation: {message}")]
    ContractViolation {
        /// Description of the broken contract.
        message: String,
    },

    /// A retriever backend failed for a collection.
    #[error("retrieval failed for collection '{collection}': {message}")]
    Retrieval {
        /// Collection being searched.
        collection: String,
        /// Backend error message.
        message: String,
    },

    /// One or more parallel retrieval tasks failed under the fail-fast policy.
    #[error("{failed} of {total} retrieval tasks failed: {first}")]
    FanOut {
        /// Number of failed tasks observed before aborting.
        failed: usize,
        /// Number of dispatched tasks.
        total: usize,
        /// First failure message.
        first: String,
    },

    /// Internal orchestration failure (task join, semaphore).
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Description of the failure.
        message: String,
    },

    /// Invalid configuration value.
    #[error("config error: {message}")]
    Config {
        /// Description of the invalid value.
        message: String,
    },
}

impl AgentError {
    /// Creates a contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation {
            message: message.into(),
        }
    }

    /// Creates an orchestration error.
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::Orchestration {
            message: message.into(),
        }
    }

    /// Creates a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Errors from the bundled `SQLite` retrieval backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// Metadata (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A connection mutex was poisoned by a panicking holder.
    #[error("connection lock poisoned")]
    LockPoisoned,

    /// The backend does not support the requested storage type.
    #[error("retriever provider '{provider}' does not support storage type '{storage_type}'")]
    UnsupportedStorage {
        /// Retriever provider name.
        provider: String,
        /// Requested storage type.
        storage_type: String,
    },
}

/// CLI command errors.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Command failed while executing.
    #[error("{0}")]
    ExecutionFailed(String),

    /// User input could not be used.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Output could not be rendered.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AgentError::contract("direct response is empty");
        assert_eq!(err.to_string(), "contract violation: direct response is empty");

        let err = AgentError::FanOut {
            failed: 1,
            total: 3,
            first: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "1 of 3 retrieval tasks failed: boom");
    }

    #[test]
    fn test_wraps_into_top_level() {
        let err: Error = StorageError::CollectionNotFound("docs".to_string()).into();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(err.to_string(), "collection not found: docs");
    }
}
