//! Note repository: the local-first facade every client talks to
//!
//! Reads answer from the local store, refreshing from the server first when
//! the reachability gate allows it. Writes land locally, are queued, and are
//! pushed right away when the server looks reachable.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use libsql::{Connection, Transaction};
use tokio::sync::{broadcast, mpsc, watch, Mutex};

use crate::config::SyncSettings;
use crate::db::{finish_transaction, Database, LocalNoteStore};
use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NoteType, SyncStatus};
use crate::remote::{ApiError, ApiSession, RemoteNote, RemoteNoteApi};
use crate::state::SyncState;
use crate::sync::{
    merge_remote_notes, EnqueueOutcome, MergeReport, PushAttempt, QueueManager, ReachabilityGate,
    SyncEvent, SyncExecutor, SyncSignals, SyncTrigger, SyncWorker, SyncWorkerHandle,
    WorkerSignal,
};

/// Thread-safe facade over the local store and the sync engine
pub struct NoteRepository<A> {
    db: Arc<Mutex<Database>>,
    gate: Arc<ReachabilityGate>,
    executor: SyncExecutor<A>,
    worker: SyncWorker<A>,
    signals: Arc<SyncSignals>,
    hint: Arc<StdMutex<Option<mpsc::Sender<SyncTrigger>>>>,
}

impl<A> Clone for NoteRepository<A> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            gate: Arc::clone(&self.gate),
            executor: self.executor.clone(),
            worker: self.worker.clone(),
            signals: Arc::clone(&self.signals),
            hint: Arc::clone(&self.hint),
        }
    }
}

impl<A: RemoteNoteApi> NoteRepository<A> {
    /// Wire up the sync engine around an open database
    pub async fn open(
        db: Database,
        api: Arc<A>,
        session: ApiSession,
        settings: SyncSettings,
    ) -> Result<Self> {
        let db = Arc::new(Mutex::new(db));
        let gate = Arc::new(ReachabilityGate::new(settings.unreachable_cooldown, true));
        let signals = Arc::new(SyncSignals::new());
        let executor = SyncExecutor::new(api, Arc::clone(&gate), session);
        let worker = SyncWorker::new(
            Arc::clone(&db),
            Arc::clone(&gate),
            executor.clone(),
            settings,
            Arc::clone(&signals),
        );

        {
            let db = db.lock().await;
            signals.publish(db.connection()).await?;
        }

        Ok(Self {
            db,
            gate,
            executor,
            worker,
            signals,
            hint: Arc::new(StdMutex::new(None)),
        })
    }

    // ---- reads ----

    /// Notes of one type, refreshed from the server when it is reachable
    pub async fn list(&self, note_type: NoteType, archived: bool) -> Result<Vec<Note>> {
        if self.gate.should_attempt_server_call() {
            match self.refresh(note_type, archived).await {
                Ok(_) => {}
                Err(Error::Remote(error)) => {
                    tracing::debug!("Serving local notes, refresh failed: {error}");
                }
                Err(error) => return Err(error),
            }
        }

        let db = self.db.lock().await;
        LocalNoteStore::new(db.connection())
            .list(note_type, archived)
            .await
    }

    /// Fetch one listing from the server and merge it into local storage.
    ///
    /// Pushes wait until the merge is done, so a listing taken before one of
    /// our own pushes is never compared against the result of that push.
    pub async fn refresh(&self, note_type: NoteType, archived: bool) -> Result<MergeReport> {
        let _reconcile = self.worker.exclusive().await;
        let remote = self.executor.fetch_list(note_type, archived).await?;
        self.merge(&remote).await
    }

    /// Substring search over local content
    pub async fn search(&self, term: &str) -> Result<Vec<Note>> {
        let db = self.db.lock().await;
        LocalNoteStore::new(db.connection()).search(term).await
    }

    /// Notes by server id, refreshed from the server when it is reachable
    pub async fn list_by_ids(&self, server_ids: &[String]) -> Result<Vec<Note>> {
        if !server_ids.is_empty() && self.gate.should_attempt_server_call() {
            let _reconcile = self.worker.exclusive().await;
            match self.executor.fetch_by_ids(server_ids).await {
                Ok(remote) => {
                    self.merge(&remote).await?;
                }
                Err(error) => tracing::debug!("Serving local notes, fetch failed: {error}"),
            }
        }

        let db = self.db.lock().await;
        LocalNoteStore::new(db.connection())
            .list_by_server_ids(server_ids)
            .await
    }

    pub async fn get(&self, id: &NoteId) -> Result<Note> {
        let db = self.db.lock().await;
        LocalNoteStore::new(db.connection())
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Resolve a full note id or a unique prefix of one
    pub async fn resolve_id_prefix(&self, prefix: &str) -> Result<NoteId> {
        let prefix = prefix.trim().to_ascii_lowercase();
        if prefix.is_empty() {
            return Err(Error::InvalidInput("Note ID cannot be empty".to_string()));
        }
        if let Ok(id) = prefix.parse::<NoteId>() {
            return Ok(id);
        }

        let db = self.db.lock().await;
        let mut matches = LocalNoteStore::new(db.connection())
            .ids_with_prefix(&prefix, 2)
            .await?;
        match matches.len() {
            0 => Err(Error::NotFound(prefix)),
            1 => Ok(matches.remove(0)),
            _ => Err(Error::InvalidInput(format!(
                "Note ID prefix '{prefix}' is ambiguous"
            ))),
        }
    }

    // ---- writes ----

    /// Save a note locally and queue it for sync
    ///
    /// A note this device has never seen is created. Editing a note in
    /// `CONFLICT` only changes the local copy; a note pending deletion is
    /// left as stored.
    pub async fn upsert(&self, note: Note) -> Result<Note> {
        let (saved, push) = {
            let db = self.db.lock().await;
            let tx = db.begin().await?;
            let result = store_upsert(&tx, note).await;
            self.finish_write(&db, tx, result).await?
        };

        if push {
            self.push_now(saved.id).await;
            return self.get(&saved.id).await;
        }
        Ok(saved)
    }

    /// Delete a note locally; the server copy follows eventually
    pub async fn delete(&self, id: &NoteId) -> Result<()> {
        let note = self.get(id).await?;
        let outcome = {
            let db = self.db.lock().await;
            let tx = db.begin().await?;
            let result = QueueManager::new(&tx).enqueue_delete(&note).await;
            self.finish_write(&db, tx, result).await?
        };

        if outcome.has_pending_work() {
            self.push_now(note.id).await;
        }
        Ok(())
    }

    /// Settle a conflicted note, keeping either the local or the server version
    pub async fn resolve_conflict(&self, id: &NoteId, keep_local: bool) -> Result<Note> {
        let note = self.get(id).await?;
        if note.sync_status != SyncStatus::Conflict {
            return Err(Error::InvalidInput(format!(
                "Note {id} is not in conflict (status {})",
                note.sync_status
            )));
        }

        if keep_local {
            {
                let db = self.db.lock().await;
                let tx = db.begin().await?;
                let result = QueueManager::new(&tx).enqueue_update(&note).await;
                self.finish_write(&db, tx, result).await?;
            }
            tracing::info!(note = %id, "Conflict resolved with the local version");
            self.push_now(*id).await;
            return self.get(id).await;
        }

        let Some(server_id) = note.server_id.clone() else {
            return Err(Error::InvalidInput(format!("Note {id} has no server copy")));
        };
        if !self.gate.should_attempt_server_call() {
            return Err(ApiError::unreachable("server is not reachable right now").into());
        }
        let _reconcile = self.worker.exclusive().await;
        let remote = self
            .executor
            .fetch_by_ids(std::slice::from_ref(&server_id))
            .await?
            .into_iter()
            .find(|remote| remote.id == server_id)
            .ok_or_else(|| Error::NotFound(format!("server note {server_id}")))?;

        let resolved = {
            let db = self.db.lock().await;
            let tx = db.begin().await?;
            let result = store_remote_version(&tx, id, &remote).await;
            self.finish_write(&db, tx, result).await?
        };
        tracing::info!(note = %id, "Conflict resolved with the server version");
        Ok(resolved)
    }

    // ---- sync control ----

    /// Run one worker pass now
    pub async fn sync_now(&self) -> Result<WorkerSignal> {
        self.worker.run_once().await
    }

    /// Feed device-level connectivity into the gate
    pub fn set_device_connected(&self, connected: bool) {
        let came_online = self.gate.set_device_connected(connected);
        if !connected {
            self.signals.set_state(SyncState::Offline);
        } else if came_online {
            self.hint(SyncTrigger::Reconnected);
        }
    }

    /// Start the background worker; it also follows `connectivity`.
    /// Dropping the returned handle stops the worker.
    pub fn start_background_sync(&self, connectivity: watch::Receiver<bool>) -> SyncWorkerHandle {
        let handle = self.worker.clone().spawn(Some(connectivity));
        *self.hint.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle.sender());
        handle
    }

    // ---- observers ----

    pub fn pending_sync_count(&self) -> watch::Receiver<usize> {
        self.signals.pending_count()
    }

    pub fn conflicts(&self) -> watch::Receiver<Vec<Note>> {
        self.signals.conflicts()
    }

    pub fn sync_state(&self) -> watch::Receiver<SyncState> {
        self.signals.state()
    }

    pub fn sync_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.signals.events()
    }

    // ---- internals ----

    /// Commit or roll back a write made under the database lock, then republish signals
    async fn finish_write<T>(&self, db: &Database, tx: Transaction, result: Result<T>) -> Result<T> {
        let value = finish_transaction(tx, result).await?;
        self.signals.publish(db.connection()).await?;
        Ok(value)
    }

    async fn merge(&self, remote: &[RemoteNote]) -> Result<MergeReport> {
        let db = self.db.lock().await;
        let tx = db.begin().await?;
        let result = merge_remote_notes(&tx, remote).await;
        self.finish_write(&db, tx, result).await
    }

    /// Push a note's entry immediately. The push runs in its own task so a
    /// dropped caller cannot cut a remote create short.
    async fn push_now(&self, note_id: NoteId) {
        if !self.gate.should_attempt_server_call() {
            return;
        }

        let worker = self.worker.clone();
        let push = tokio::spawn(async move { worker.try_push(&note_id).await });
        match push.await {
            Ok(Ok(PushAttempt::Busy)) => self.hint(SyncTrigger::LocalChange),
            Ok(Ok(PushAttempt::Pushed | PushAttempt::Skipped)) => {}
            Ok(Err(error)) => tracing::warn!(note = %note_id, "Immediate push failed: {error}"),
            Err(error) => tracing::warn!(note = %note_id, "Immediate push task failed: {error}"),
        }
    }

    fn hint(&self, trigger: SyncTrigger) {
        let hint = self.hint.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = hint.as_ref() {
            // Full means a pass is already pending
            let _ = sender.try_send(trigger);
        }
    }
}

/// Local half of `upsert`; returns the stored note and whether it has work to push
async fn store_upsert(conn: &Connection, note: Note) -> Result<(Note, bool)> {
    let notes = LocalNoteStore::new(conn);

    let Some(mut stored) = notes.get(&note.id).await? else {
        if note.server_id.is_some() {
            return Err(Error::InvalidInput(format!(
                "Note {} is unknown locally but carries a server id",
                note.id
            )));
        }
        let mut created = note;
        created.sync_status = SyncStatus::PendingCreate;
        created.server_updated_at = None;
        notes.insert(&created).await?;
        QueueManager::new(conn).enqueue_create(&created).await?;
        return Ok((created, true));
    };

    match stored.sync_status {
        SyncStatus::PendingDelete => {
            tracing::debug!(note = %stored.id, "Ignoring edit of note pending deletion");
            Ok((stored, false))
        }
        SyncStatus::Conflict => {
            stored.content = note.content;
            stored.note_type = note.note_type;
            stored.is_archived = note.is_archived;
            stored.touch();
            notes.save(&stored).await?;
            Ok((stored, false))
        }
        SyncStatus::PendingCreate | SyncStatus::PendingUpdate | SyncStatus::Synced => {
            stored.content = note.content;
            stored.note_type = note.note_type;
            stored.is_archived = note.is_archived;
            stored.touch();
            notes.save(&stored).await?;

            let outcome = QueueManager::new(conn).enqueue_update(&stored).await?;
            let push = outcome.has_pending_work();
            if matches!(outcome, EnqueueOutcome::Queued(_) | EnqueueOutcome::Replaced(_)) {
                stored = notes
                    .get(&stored.id)
                    .await?
                    .ok_or_else(|| Error::NotFound(stored.id.to_string()))?;
            }
            Ok((stored, push))
        }
    }
}

/// Local half of keeping the server version of a conflicted note
async fn store_remote_version(conn: &Connection, id: &NoteId, remote: &RemoteNote) -> Result<Note> {
    let notes = LocalNoteStore::new(conn);
    let Some(mut note) = notes.get(id).await? else {
        return Err(Error::NotFound(id.to_string()));
    };
    note.apply_remote(remote);
    notes.save(&note).await?;
    QueueManager::new(conn).clear_note(id).await?;
    Ok(note)
}
