//! Storage error types.

use cashio_core::{CommitmentError, CryptoError, InputError, SerializationError};
use thiserror::Error;

/// Result alias used throughout the storage crate.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
///
/// Nothing in this crate retries on error; every variant is handed back to
/// the caller, which owns any retry or backoff policy.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The tree has no free leaf positions left.
    #[error("commitment tree is full (capacity {capacity})")]
    TreeFull {
        /// Number of leaves the tree can hold.
        capacity: u64,
    },

    /// The commitment is not a valid leaf value.
    #[error("invalid commitment: {0}")]
    InvalidCommitment(#[from] CommitmentError),

    /// The commitment has already been inserted.
    #[error("commitment {0} is already in the tree")]
    DuplicateCommitment(String),

    /// A lookup found nothing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A record that must exist is missing or inconsistent.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Stored content failed authentication or content-hash verification.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Blob exceeds the configured size bound.
    #[error("blob of {size} bytes exceeds the {max} byte limit")]
    BlobTooLarge {
        /// Size of the rejected blob.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Rollup ids must be 1 to 255 bytes long.
    #[error("invalid rollup id: {0:?}")]
    InvalidRollupId(String),

    /// Persisted state was written with a different configuration.
    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    /// RocksDB error.
    #[error("RocksDB error: {0}")]
    RocksDb(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Encryption or key setup failed.
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Typed proof inputs were rejected.
    #[error("invalid proof inputs: {0}")]
    Input(#[from] InputError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::RocksDb(e.to_string())
    }
}

impl From<SerializationError> for StorageError {
    fn from(e: SerializationError) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<CryptoError> for StorageError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AuthenticationFailed | CryptoError::Truncated { .. } => {
                StorageError::Integrity(e.to_string())
            }
            other => StorageError::Crypto(other),
        }
    }
}
