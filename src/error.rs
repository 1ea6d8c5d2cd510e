//! Error types for warren.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during index operations.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Dimension mismatch between a supplied vector and the index.
    #[error("dimension mismatch: index has {expected} dimensions, vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Invalid parameter value (zero dimension, zero topk, zero degree).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// External ID outside the issued range.
    #[error("invalid id: {0}")]
    InvalidId(u64),

    /// Deletion of an ID whose slot is already tombstoned.
    #[error("id {0} is already deleted")]
    AlreadyDeleted(u64),

    /// Unknown user key on retrieval.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// A required index file is missing on open.
    #[error("missing index file: {0}")]
    MissingFile(PathBuf),

    /// Metadata cannot be deserialized, or file sizes disagree with it.
    #[error("corrupted index: {0}")]
    Corrupted(String),

    /// I/O error (file open, extend, remap, write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key store backend error.
    #[error("key store error: {0}")]
    Store(String),
}

/// Result type alias for warren operations.
pub type Result<T> = std::result::Result<T, IndexError>;

impl From<redb::Error> for IndexError {
    fn from(e: redb::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<redb::DatabaseError> for IndexError {
    fn from(e: redb::DatabaseError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<redb::TransactionError> for IndexError {
    fn from(e: redb::TransactionError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<redb::TableError> for IndexError {
    fn from(e: redb::TableError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<redb::StorageError> for IndexError {
    fn from(e: redb::StorageError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<redb::CommitError> for IndexError {
    fn from(e: redb::CommitError) -> Self {
        Self::Store(e.to_string())
    }
}
