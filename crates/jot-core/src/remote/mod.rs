//! Remote note service contract
//!
//! The sync engine only ever talks to the server through [`RemoteNoteApi`].
//! Every failure is an [`ApiError`] whose `unreachable` flag separates
//! transport problems (drive the reachability gate) from domain rejections.

mod http;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::NoteType;

pub use http::HttpNoteApi;

pub type ApiResult<T> = Result<T, ApiError>;

/// Server endpoint plus bearer token for one signed-in account
#[derive(Clone, PartialEq, Eq)]
pub struct ApiSession {
    pub base_url: String,
    pub token: String,
}

impl ApiSession {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for ApiSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiSession")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// A note as the server returns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteNote {
    pub id: String,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    #[serde(default)]
    pub is_archived: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of an upsert call; `id == None` asks the server to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertRequest {
    pub id: Option<String>,
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    pub is_archived: bool,
}

/// Failure reported by the remote note service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: Option<u16>,
    pub message: String,
    /// True for transport failures and server-unavailable responses
    pub unreachable: bool,
}

impl ApiError {
    /// The server could not be reached or is not answering
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
            unreachable: true,
        }
    }

    /// The server answered and refused the request
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
            unreachable: false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.code == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.code == Some(404)
    }
}

/// Contract of the remote note service.
///
/// Implementations must not retry on their own; retries belong to the sync
/// worker.
pub trait RemoteNoteApi: Send + Sync + 'static {
    /// List notes of one type and archive state
    fn list(
        &self,
        session: &ApiSession,
        note_type: NoteType,
        archived: bool,
    ) -> impl Future<Output = ApiResult<Vec<RemoteNote>>> + Send;

    /// Fetch specific notes by server id; unknown ids are simply absent
    fn list_by_ids(
        &self,
        session: &ApiSession,
        ids: &[String],
    ) -> impl Future<Output = ApiResult<Vec<RemoteNote>>> + Send;

    /// Create (`id == None`) or overwrite a note
    fn upsert(
        &self,
        session: &ApiSession,
        request: &UpsertRequest,
    ) -> impl Future<Output = ApiResult<RemoteNote>> + Send;

    /// Delete notes by server id
    fn delete(
        &self,
        session: &ApiSession,
        ids: &[String],
    ) -> impl Future<Output = ApiResult<()>> + Send;
}

/// Stand-in used when no remote endpoint is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineNoteApi;

const OFFLINE_MESSAGE: &str = "remote sync is not configured";

impl RemoteNoteApi for OfflineNoteApi {
    async fn list(
        &self,
        _session: &ApiSession,
        _note_type: NoteType,
        _archived: bool,
    ) -> ApiResult<Vec<RemoteNote>> {
        Err(ApiError::unreachable(OFFLINE_MESSAGE))
    }

    async fn list_by_ids(
        &self,
        _session: &ApiSession,
        _ids: &[String],
    ) -> ApiResult<Vec<RemoteNote>> {
        Err(ApiError::unreachable(OFFLINE_MESSAGE))
    }

    async fn upsert(
        &self,
        _session: &ApiSession,
        _request: &UpsertRequest,
    ) -> ApiResult<RemoteNote> {
        Err(ApiError::unreachable(OFFLINE_MESSAGE))
    }

    async fn delete(&self, _session: &ApiSession, _ids: &[String]) -> ApiResult<()> {
        Err(ApiError::unreachable(OFFLINE_MESSAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_debug_redacts_token() {
        let session = ApiSession::new("https://notes.example.com/", "secret");
        let debug = format!("{session:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(session.base_url, "https://notes.example.com");
    }

    #[test]
    fn remote_note_uses_camel_case_wire_names() {
        let note: RemoteNote = serde_json::from_str(
            r#"{"id":"n1","content":"hi","type":"todo","isArchived":true,
                "createdAt":"2026-01-01T00:00:00Z","updatedAt":"2026-01-02T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(note.note_type, NoteType::Todo);
        assert!(note.is_archived);
        assert_eq!(note.updated_at, "2026-01-02T00:00:00Z");
    }

    #[test]
    fn api_error_classification() {
        assert!(ApiError::rejected(409, "stale").is_conflict());
        assert!(ApiError::rejected(404, "gone").is_not_found());
        assert!(!ApiError::rejected(422, "bad").unreachable);
        assert!(ApiError::unreachable("timeout").unreachable);
    }

    #[tokio::test]
    async fn offline_api_reports_unreachable() {
        let session = ApiSession::new("http://localhost", "t");
        let error = OfflineNoteApi
            .list(&session, NoteType::Note, false)
            .await
            .unwrap_err();
        assert!(error.unreachable);
    }
}
