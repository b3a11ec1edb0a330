//! Remote backend selected from the environment

use jot_core::remote::{
    ApiResult, ApiSession, HttpNoteApi, OfflineNoteApi, RemoteNote, RemoteNoteApi, UpsertRequest,
};
use jot_core::NoteType;

/// HTTP when an endpoint is configured, otherwise local-only
pub enum CliRemote {
    Http(HttpNoteApi),
    Offline(OfflineNoteApi),
}

impl RemoteNoteApi for CliRemote {
    async fn list(
        &self,
        session: &ApiSession,
        note_type: NoteType,
        archived: bool,
    ) -> ApiResult<Vec<RemoteNote>> {
        match self {
            Self::Http(api) => api.list(session, note_type, archived).await,
            Self::Offline(api) => api.list(session, note_type, archived).await,
        }
    }

    async fn list_by_ids(&self, session: &ApiSession, ids: &[String]) -> ApiResult<Vec<RemoteNote>> {
        match self {
            Self::Http(api) => api.list_by_ids(session, ids).await,
            Self::Offline(api) => api.list_by_ids(session, ids).await,
        }
    }

    async fn upsert(&self, session: &ApiSession, request: &UpsertRequest) -> ApiResult<RemoteNote> {
        match self {
            Self::Http(api) => api.upsert(session, request).await,
            Self::Offline(api) => api.upsert(session, request).await,
        }
    }

    async fn delete(&self, session: &ApiSession, ids: &[String]) -> ApiResult<()> {
        match self {
            Self::Http(api) => api.delete(session, ids).await,
            Self::Offline(api) => api.delete(session, ids).await,
        }
    }
}
