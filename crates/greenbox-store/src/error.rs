//! Error types for greenbox-store.

use std::path::PathBuf;

/// Result type for greenbox-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in greenbox-store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Value could not be encoded or decoded as JSON.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Another thread panicked while holding the store lock.
    #[error("Store lock poisoned")]
    LockPoisoned,
}
