use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] jot_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No note content provided")]
    EmptyContent,
    #[error("Note ID cannot be empty")]
    EmptyNoteId,
    #[error("Search query cannot be empty")]
    EmptySearchQuery,
    #[error("Note not found for id/prefix: {0}")]
    NoteNotFound(String),
    #[error("{0}")]
    AmbiguousNoteId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sync incomplete: {0} change(s) still pending")]
    SyncIncomplete(usize),
    #[error("Sync is not configured. Set JOT_API_URL and JOT_API_TOKEN to enable it.")]
    SyncNotConfigured,
}

impl From<jot_core::remote::ApiError> for CliError {
    fn from(error: jot_core::remote::ApiError) -> Self {
        Self::Core(error.into())
    }
}
