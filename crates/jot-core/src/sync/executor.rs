//! Sync executor: one queued intent in, one remote call, one classified outcome

use std::sync::Arc;

use super::ReachabilityGate;
use crate::models::{NoteType, QueueEntry, QueueOperation, SyncPayload};
use crate::remote::{ApiError, ApiResult, ApiSession, RemoteNote, RemoteNoteApi, UpsertRequest};

/// Failure message for an UPDATE that reached the executor without a server id
pub const MISSING_SERVER_ID: &str = "cannot update a note that has no server id";

/// Result of executing one queue entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The server accepted the write
    Success {
        server_id: String,
        server_updated_at: String,
    },
    /// The server holds a different version (HTTP 409)
    Conflict,
    /// Nothing changed on the server; the entry should be retried
    Failure(String),
    /// The note no longer exists on the server (or never did)
    Deleted,
}

/// Translates queue entries into remote calls. Never retries on its own.
pub struct SyncExecutor<A> {
    api: Arc<A>,
    gate: Arc<ReachabilityGate>,
    session: ApiSession,
}

impl<A> Clone for SyncExecutor<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            gate: Arc::clone(&self.gate),
            session: self.session.clone(),
        }
    }
}

impl<A: RemoteNoteApi> SyncExecutor<A> {
    pub const fn new(api: Arc<A>, gate: Arc<ReachabilityGate>, session: ApiSession) -> Self {
        Self { api, gate, session }
    }

    /// Dispatch an entry to the matching remote call
    pub async fn execute(&self, entry: &QueueEntry) -> SyncOutcome {
        match entry.operation {
            QueueOperation::Create => self.execute_create(&entry.payload).await,
            QueueOperation::Update => {
                let payload = match entry.server_id() {
                    Some(server_id) if entry.payload.server_id.is_none() => {
                        entry.payload.with_server_id(server_id)
                    }
                    _ => entry.payload.clone(),
                };
                self.execute_update(&payload).await
            }
            QueueOperation::Delete => self.execute_delete(entry.server_id()).await,
        }
    }

    pub async fn execute_create(&self, payload: &SyncPayload) -> SyncOutcome {
        let request = upsert_request(None, payload);
        match self.observe(self.api.upsert(&self.session, &request).await) {
            Ok(remote) => success(remote),
            Err(error) => SyncOutcome::Failure(error.message),
        }
    }

    pub async fn execute_update(&self, payload: &SyncPayload) -> SyncOutcome {
        let Some(server_id) = payload.server_id.clone() else {
            return SyncOutcome::Failure(MISSING_SERVER_ID.to_string());
        };

        let request = upsert_request(Some(server_id), payload);
        match self.observe(self.api.upsert(&self.session, &request).await) {
            Ok(remote) => success(remote),
            Err(error) if error.is_conflict() => SyncOutcome::Conflict,
            Err(error) => SyncOutcome::Failure(error.message),
        }
    }

    pub async fn execute_delete(&self, server_id: Option<&str>) -> SyncOutcome {
        let Some(server_id) = server_id else {
            return SyncOutcome::Deleted;
        };

        let ids = [server_id.to_string()];
        match self.observe(self.api.delete(&self.session, &ids).await) {
            Ok(()) => SyncOutcome::Deleted,
            Err(error) if error.is_not_found() => SyncOutcome::Deleted,
            Err(error) => SyncOutcome::Failure(error.message),
        }
    }

    /// Fetch one type/archive listing from the server
    pub async fn fetch_list(&self, note_type: NoteType, archived: bool) -> ApiResult<Vec<RemoteNote>> {
        self.observe(self.api.list(&self.session, note_type, archived).await)
    }

    /// Fetch specific server notes
    pub async fn fetch_by_ids(&self, ids: &[String]) -> ApiResult<Vec<RemoteNote>> {
        self.observe(self.api.list_by_ids(&self.session, ids).await)
    }

    /// Feed the outcome of a call into the reachability gate
    fn observe<T>(&self, result: ApiResult<T>) -> ApiResult<T> {
        match &result {
            Ok(_) => self.gate.report_success(),
            Err(ApiError {
                unreachable: true,
                message,
                ..
            }) => {
                tracing::warn!("Server unreachable: {message}");
                self.gate.report_unreachable();
            }
            // The server answered, it is just unhappy with the request
            Err(_) => self.gate.report_success(),
        }
        result
    }
}

fn upsert_request(id: Option<String>, payload: &SyncPayload) -> UpsertRequest {
    UpsertRequest {
        id,
        content: payload.content.clone(),
        note_type: payload.note_type,
        is_archived: payload.is_archived,
    }
}

fn success(remote: RemoteNote) -> SyncOutcome {
    SyncOutcome::Success {
        server_id: remote.id,
        server_updated_at: remote.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::fake::FakeNoteApi;
    use std::time::Duration;

    fn setup() -> (Arc<FakeNoteApi>, Arc<ReachabilityGate>, SyncExecutor<FakeNoteApi>) {
        let api = Arc::new(FakeNoteApi::new());
        let gate = Arc::new(ReachabilityGate::new(Duration::from_secs(30), true));
        let executor = SyncExecutor::new(
            Arc::clone(&api),
            Arc::clone(&gate),
            ApiSession::new("http://fake", "token"),
        );
        (api, gate, executor)
    }

    fn payload(server_id: Option<&str>, content: &str) -> SyncPayload {
        SyncPayload::new(
            server_id.map(str::to_string),
            content.to_string(),
            NoteType::Note,
            false,
        )
    }

    #[tokio::test]
    async fn create_returns_server_identity() {
        let (api, _, executor) = setup();

        let outcome = executor.execute_create(&payload(None, "hello")).await;
        let SyncOutcome::Success { server_id, .. } = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(api.note(&server_id).unwrap().content, "hello");
    }

    #[tokio::test]
    async fn unreachable_failure_trips_the_gate() {
        let (api, gate, executor) = setup();
        api.fail_next(ApiError::unreachable("connection refused"));

        let outcome = executor.execute_create(&payload(None, "hello")).await;
        assert_eq!(
            outcome,
            SyncOutcome::Failure("connection refused".to_string())
        );
        assert!(!gate.is_server_reachable());
    }

    #[tokio::test]
    async fn domain_rejection_leaves_gate_open() {
        let (api, gate, executor) = setup();
        api.fail_next(ApiError::rejected(422, "content too long"));

        let outcome = executor.execute_create(&payload(None, "hello")).await;
        assert!(matches!(outcome, SyncOutcome::Failure(_)));
        assert!(gate.is_server_reachable());
    }

    #[tokio::test]
    async fn update_without_server_id_fails_fast() {
        let (api, _, executor) = setup();

        let outcome = executor.execute_update(&payload(None, "edit")).await;
        assert_eq!(outcome, SyncOutcome::Failure(MISSING_SERVER_ID.to_string()));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn update_conflict_is_not_a_failure() {
        let (api, _, executor) = setup();
        let remote = api.seed("server copy", NoteType::Note);
        api.fail_next(ApiError::rejected(409, "version mismatch"));

        let outcome = executor
            .execute_update(&payload(Some(&remote.id), "local edit"))
            .await;
        assert_eq!(outcome, SyncOutcome::Conflict);
    }

    #[tokio::test]
    async fn delete_of_local_only_note_skips_network() {
        let (api, _, executor) = setup();

        assert_eq!(executor.execute_delete(None).await, SyncOutcome::Deleted);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn delete_is_idempotent_on_not_found() {
        let (_, _, executor) = setup();

        let outcome = executor.execute_delete(Some("srv-missing")).await;
        assert_eq!(outcome, SyncOutcome::Deleted);
    }

    #[tokio::test]
    async fn delete_failure_is_retried() {
        let (api, _, executor) = setup();
        let remote = api.seed("keep trying", NoteType::Note);
        api.fail_next(ApiError::rejected(500, "boom"));

        let outcome = executor.execute_delete(Some(&remote.id)).await;
        assert!(matches!(outcome, SyncOutcome::Failure(_)));
        assert!(api.note(&remote.id).is_some());
    }
}
