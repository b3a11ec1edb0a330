//! Observable sync state for clients

use libsql::Connection;
use tokio::sync::{broadcast, watch};

use super::QueueManager;
use crate::db::LocalNoteStore;
use crate::error::Result;
use crate::models::{Note, NoteId, QueueOperation, SyncStatus};
use crate::state::SyncState;

const EVENT_CAPACITY: usize = 64;

/// Notable things the sync engine did on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// A queue entry ran out of retries and was dropped; its change was never sent
    Abandoned {
        note_id: NoteId,
        operation: QueueOperation,
        last_error: Option<String>,
    },
}

/// Watch channels behind the repository's observable properties
pub struct SyncSignals {
    pending_count: watch::Sender<usize>,
    conflicts: watch::Sender<Vec<Note>>,
    state: watch::Sender<SyncState>,
    events: broadcast::Sender<SyncEvent>,
}

impl Default for SyncSignals {
    fn default() -> Self {
        Self {
            pending_count: watch::Sender::new(0),
            conflicts: watch::Sender::new(Vec::new()),
            state: watch::Sender::new(SyncState::default()),
            events: broadcast::Sender::new(EVENT_CAPACITY),
        }
    }
}

impl SyncSignals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the pending count and conflict list from storage
    pub async fn publish(&self, conn: &Connection) -> Result<()> {
        let pending = QueueManager::new(conn).pending_count().await?;
        let conflicts = LocalNoteStore::new(conn)
            .list_by_status(SyncStatus::Conflict)
            .await?;

        self.pending_count.send_if_modified(|current| {
            let changed = *current != pending;
            *current = pending;
            changed
        });
        self.conflicts.send_if_modified(|current| {
            let changed = *current != conflicts;
            *current = conflicts;
            changed
        });
        Ok(())
    }

    pub fn set_state(&self, state: SyncState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }

    pub fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub fn pending_count(&self) -> watch::Receiver<usize> {
        self.pending_count.subscribe()
    }

    pub fn conflicts(&self) -> watch::Receiver<Vec<Note>> {
        self.conflicts.subscribe()
    }

    pub fn state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }
}
