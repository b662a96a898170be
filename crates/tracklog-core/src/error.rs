//! Error types for tracklog-core

use thiserror::Error;

/// Result type alias using tracklog-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tracklog-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// The streaming API failed or returned malformed data
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Transport-level HTTP failure while talking to the streaming API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A batch was rejected before reaching the database
    #[error("Storage error: {0}")]
    Storage(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Another sync for the same user and category is still running
    #[error("Sync already in progress: {0}")]
    SyncInProgress(String),
}

impl Error {
    /// Whether the failure originated at the streaming API side.
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Http(_))
    }

    /// Whether the failure originated at the storage side.
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Sqlite(_))
    }
}
