//! Scriptable in-memory note service for tests

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, Notify, OwnedMutexGuard};

use super::{ApiError, ApiResult, ApiSession, RemoteNote, RemoteNoteApi, UpsertRequest};
use crate::models::NoteType;

#[derive(Default)]
struct FakeState {
    notes: BTreeMap<String, RemoteNote>,
    next_id: u64,
    clock: u64,
    scripted: VecDeque<ApiError>,
    always: Option<ApiError>,
    calls: Vec<&'static str>,
}

impl FakeState {
    fn tick(&mut self) -> String {
        self.clock += 1;
        format!("2026-03-01T00:00:{:02}.000Z", self.clock)
    }

    fn next_failure(&mut self) -> Option<ApiError> {
        self.scripted.pop_front().or_else(|| self.always.clone())
    }
}

/// In-memory stand-in for the note service
#[derive(Default)]
pub struct FakeNoteApi {
    state: Mutex<FakeState>,
    list_gate: Arc<AsyncMutex<()>>,
    list_taken: Notify,
}

impl FakeNoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the next call with `error`
    pub fn fail_next(&self, error: ApiError) {
        self.state().scripted.push_back(error);
    }

    /// Fail every call with `error` until cleared with `None`
    pub fn fail_always(&self, error: Option<ApiError>) {
        self.state().always = error;
    }

    /// Put a note on the server as if another device created it
    pub fn seed(&self, content: &str, note_type: NoteType) -> RemoteNote {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("srv-{}", state.next_id);
        let now = state.tick();
        let note = RemoteNote {
            id: id.clone(),
            content: content.to_string(),
            note_type,
            is_archived: false,
            created_at: now.clone(),
            updated_at: now,
        };
        state.notes.insert(id, note.clone());
        note
    }

    /// Edit a server note as if another device changed it
    pub fn edit(&self, id: &str, content: &str) -> RemoteNote {
        let mut state = self.state();
        let now = state.tick();
        let note = state.notes.get_mut(id).expect("seeded note");
        note.content = content.to_string();
        note.updated_at = now;
        note.clone()
    }

    /// Make `list` answer with what the server holds now, but only once the
    /// returned guard is dropped
    pub async fn hold_lists(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.list_gate).lock_owned().await
    }

    /// Wait until a held `list` call has taken its snapshot
    pub async fn list_taken(&self) {
        self.list_taken.notified().await;
    }

    pub fn note(&self, id: &str) -> Option<RemoteNote> {
        self.state().notes.get(id).cloned()
    }

    pub fn note_count(&self) -> usize {
        self.state().notes.len()
    }

    /// Names of the calls received so far, in order
    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.state().calls.iter().filter(|call| **call == name).count()
    }
}

impl RemoteNoteApi for FakeNoteApi {
    async fn list(
        &self,
        _session: &ApiSession,
        note_type: NoteType,
        archived: bool,
    ) -> ApiResult<Vec<RemoteNote>> {
        let snapshot = {
            let mut state = self.state();
            state.calls.push("list");
            if let Some(error) = state.next_failure() {
                return Err(error);
            }
            state
                .notes
                .values()
                .filter(|note| note.note_type == note_type && note.is_archived == archived)
                .cloned()
                .collect()
        };
        self.list_taken.notify_one();
        let _released = self.list_gate.lock().await;
        Ok(snapshot)
    }

    async fn list_by_ids(
        &self,
        _session: &ApiSession,
        ids: &[String],
    ) -> ApiResult<Vec<RemoteNote>> {
        let mut state = self.state();
        state.calls.push("list_by_ids");
        if let Some(error) = state.next_failure() {
            return Err(error);
        }
        Ok(ids
            .iter()
            .filter_map(|id| state.notes.get(id).cloned())
            .collect())
    }

    async fn upsert(&self, _session: &ApiSession, request: &UpsertRequest) -> ApiResult<RemoteNote> {
        let mut state = self.state();
        state.calls.push("upsert");
        if let Some(error) = state.next_failure() {
            return Err(error);
        }

        let now = state.tick();
        let id = if let Some(id) = &request.id {
            if !state.notes.contains_key(id) {
                return Err(ApiError::rejected(404, format!("note {id} not found")));
            }
            id.clone()
        } else {
            state.next_id += 1;
            format!("srv-{}", state.next_id)
        };

        let created_at = state
            .notes
            .get(&id)
            .map_or_else(|| now.clone(), |existing| existing.created_at.clone());
        let note = RemoteNote {
            id: id.clone(),
            content: request.content.clone(),
            note_type: request.note_type,
            is_archived: request.is_archived,
            created_at,
            updated_at: now,
        };
        state.notes.insert(id, note.clone());
        Ok(note)
    }

    async fn delete(&self, _session: &ApiSession, ids: &[String]) -> ApiResult<()> {
        let mut state = self.state();
        state.calls.push("delete");
        if let Some(error) = state.next_failure() {
            return Err(error);
        }
        let mut missing = Vec::new();
        for id in ids {
            if state.notes.remove(id).is_none() {
                missing.push(id.clone());
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ApiError::rejected(
                404,
                format!("notes not found: {}", missing.join(",")),
            ))
        }
    }
}
