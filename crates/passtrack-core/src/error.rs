//! Error types for the pass tracker core

use thiserror::Error;

/// Main error type for pass tracker operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Pass identifier failed validation
    #[error("Invalid pass id: {0}")]
    InvalidPassId(String),

    /// Account identifier failed validation
    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    /// The remote store rejected or failed a request
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Error during storage operations (redb)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Database creation/opening error
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Table error
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    /// Storage operation error
    #[error("Storage operation error: {0}")]
    StorageOp(#[from] redb::StorageError),

    /// Commit error
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using TrackerError
pub type TrackerResult<T> = Result<T, TrackerError>;

impl From<serde_json::Error> for TrackerError {
    fn from(e: serde_json::Error) -> Self {
        TrackerError::Serialization(e.to_string())
    }
}
