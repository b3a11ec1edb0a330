//! Error types for jot-core

use thiserror::Error;

use crate::remote::ApiError;

/// Result type alias using jot-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jot-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote note service error
    #[error("Remote error: {0}")]
    Remote(ApiError),

    /// Background sync task failure
    #[error("Sync error: {0}")]
    Sync(String),
}

impl From<ApiError> for Error {
    fn from(error: ApiError) -> Self {
        Self::Remote(error)
    }
}
