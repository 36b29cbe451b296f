//! Error types for the document store

use std::path::PathBuf;

/// Errors raised by [`crate::DocumentStore`]
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure outside the database engine
    #[error("i/o error at {path}: {source}")]
    Io {
        /// Path being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Database file could not be created or opened
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction could not be started
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Collection table could not be opened
    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    /// Engine-level read or write failure
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// Write transaction failed to commit
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Compaction was refused or failed
    #[error("compaction error: {0}")]
    Compaction(#[from] redb::CompactionError),

    /// Document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Build an [`StoreError::Io`] for `path`
    #[inline]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
