//! Queue manager: coalescing rules over the operation queue
//!
//! Keeps at most one live entry per note. Callers must hold the database
//! lock for the whole call; each method is a read-modify-write over the
//! queue and notes tables.

use libsql::Connection;

use crate::db::{LocalNoteStore, QueueStore, UnreadableEntry};
use crate::error::Result;
use crate::models::{Note, NoteId, QueueEntry, QueueOperation, SyncStatus};

/// What an enqueue call did to the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new entry was appended
    Queued(QueueEntry),
    /// The pending CREATE now carries the latest content
    Merged(QueueEntry),
    /// The pending UPDATE's payload was replaced in place
    Replaced(QueueEntry),
    /// A pending DELETE wins over the new intent
    Ignored,
    /// Nothing had reached the server, so the note was removed locally
    DeletedLocally,
}

impl EnqueueOutcome {
    /// Whether there is now something to send for this note
    pub const fn has_pending_work(&self) -> bool {
        matches!(self, Self::Queued(_) | Self::Merged(_) | Self::Replaced(_))
    }
}

/// How a successful push was folded back into local state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushCompletion {
    /// Entry removed and note marked `SYNCED`
    Synced,
    /// The entry was edited while in flight; it stays queued as an UPDATE
    Superseded,
    /// A CREATE landed for a note that was deleted locally meanwhile
    OrphanedCreate { server_id: String },
    /// The entry was consumed by something else (merge conflict, delete)
    Detached,
}

pub struct QueueManager<'a> {
    notes: LocalNoteStore<'a>,
    queue: QueueStore<'a>,
}

impl<'a> QueueManager<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self {
            notes: LocalNoteStore::new(conn),
            queue: QueueStore::new(conn),
        }
    }

    /// Queue the first push of a freshly created note
    pub async fn enqueue_create(&self, note: &Note) -> Result<QueueEntry> {
        let mut payload = note.payload();
        payload.server_id = None;
        let entry = self
            .queue
            .insert(&note.id, QueueOperation::Create, &payload)
            .await?;
        self.notes
            .update_sync_status(&note.id, SyncStatus::PendingCreate)
            .await?;
        tracing::debug!(note = %note.id, queue_id = entry.queue_id, "Queued CREATE");
        Ok(entry)
    }

    /// Queue the latest content of an edited note
    pub async fn enqueue_update(&self, note: &Note) -> Result<EnqueueOutcome> {
        self.discard_unreadable(&note.id).await?;
        let Some(existing) = self.queue.latest_for_note(&note.id).await? else {
            if note.server_id.is_none() {
                // Nothing ever reached the server: the edit is a create
                return Ok(EnqueueOutcome::Queued(self.enqueue_create(note).await?));
            }
            let entry = self
                .queue
                .insert(&note.id, QueueOperation::Update, &note.payload())
                .await?;
            self.notes
                .update_sync_status(&note.id, SyncStatus::PendingUpdate)
                .await?;
            tracing::debug!(note = %note.id, queue_id = entry.queue_id, "Queued UPDATE");
            return Ok(EnqueueOutcome::Queued(entry));
        };

        match existing.operation {
            QueueOperation::Create => {
                let mut payload = note.payload();
                payload.server_id = None;
                self.queue
                    .rewrite(existing.queue_id, QueueOperation::Create, &payload)
                    .await?;
                tracing::debug!(note = %note.id, "Merged edit into pending CREATE");
                Ok(EnqueueOutcome::Merged(QueueEntry {
                    note_server_id: None,
                    payload,
                    ..existing
                }))
            }
            QueueOperation::Update => {
                let payload = note.payload();
                self.queue
                    .rewrite(existing.queue_id, QueueOperation::Update, &payload)
                    .await?;
                self.notes
                    .update_sync_status(&note.id, SyncStatus::PendingUpdate)
                    .await?;
                tracing::debug!(note = %note.id, "Replaced pending UPDATE payload");
                Ok(EnqueueOutcome::Replaced(QueueEntry {
                    note_server_id: payload.server_id.clone(),
                    payload,
                    ..existing
                }))
            }
            QueueOperation::Delete => {
                tracing::debug!(note = %note.id, "Ignoring edit of note pending deletion");
                Ok(EnqueueOutcome::Ignored)
            }
        }
    }

    /// Queue removal of a note, or remove it outright if the server never saw it
    pub async fn enqueue_delete(&self, note: &Note) -> Result<EnqueueOutcome> {
        self.discard_unreadable(&note.id).await?;
        let existing = self.queue.latest_for_note(&note.id).await?;
        let server_id = note.server_id.clone().or_else(|| {
            existing
                .as_ref()
                .and_then(|entry| entry.note_server_id.clone())
        });

        if let Some(entry) = existing {
            self.queue.delete(entry.queue_id).await?;
            if entry.operation == QueueOperation::Create {
                self.notes.delete(&note.id).await?;
                tracing::debug!(note = %note.id, "Cancelled CREATE before send");
                return Ok(EnqueueOutcome::DeletedLocally);
            }
        }

        let Some(server_id) = server_id else {
            self.notes.delete(&note.id).await?;
            tracing::debug!(note = %note.id, "Deleted never-synced note locally");
            return Ok(EnqueueOutcome::DeletedLocally);
        };

        let payload = note.payload().with_server_id(server_id);
        let entry = self
            .queue
            .insert(&note.id, QueueOperation::Delete, &payload)
            .await?;
        self.notes
            .update_sync_status(&note.id, SyncStatus::PendingDelete)
            .await?;
        tracing::debug!(note = %note.id, queue_id = entry.queue_id, "Queued DELETE");
        Ok(EnqueueOutcome::Queued(entry))
    }

    /// A new intent for the note replaces whatever unreadable row it had
    async fn discard_unreadable(&self, note_id: &NoteId) -> Result<()> {
        for dropped in self.queue.remove_unreadable(Some(note_id)).await? {
            tracing::warn!(
                note = %note_id,
                op = %dropped.operation,
                "Replacing unreadable queue entry: {}",
                dropped.reason
            );
        }
        Ok(())
    }

    /// Remove every entry whose payload cannot be decoded
    pub async fn quarantine_unreadable(&self) -> Result<Vec<UnreadableEntry>> {
        self.queue.remove_unreadable(None).await
    }

    /// Head of the queue
    pub async fn next_pending_operation(&self) -> Result<Option<QueueEntry>> {
        Ok(self.queue.head(1).await?.into_iter().next())
    }

    /// Up to `limit` entries in FIFO order
    pub async fn pending_operations(&self, limit: usize) -> Result<Vec<QueueEntry>> {
        self.queue.head(limit).await
    }

    pub async fn entry(&self, queue_id: i64) -> Result<Option<QueueEntry>> {
        self.queue.get(queue_id).await
    }

    pub async fn entry_for_note(&self, note_id: &NoteId) -> Result<Option<QueueEntry>> {
        self.queue.latest_for_note(note_id).await
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.queue.count().await
    }

    pub async fn mark_operation_complete(&self, queue_id: i64) -> Result<()> {
        self.queue.delete(queue_id).await
    }

    pub async fn mark_operation_failed(&self, queue_id: i64, error: &str) -> Result<()> {
        self.queue.mark_failed(queue_id, error).await
    }

    /// Drop whatever is queued for a note
    pub async fn clear_note(&self, note_id: &NoteId) -> Result<()> {
        self.queue.delete_for_note(note_id).await
    }

    /// Fold a successful create/update back into local state.
    ///
    /// `sent` is the entry as it was when the request went out; the live
    /// entry may have been edited or consumed since.
    pub async fn complete_push(
        &self,
        sent: &QueueEntry,
        server_id: &str,
        server_updated_at: &str,
    ) -> Result<PushCompletion> {
        match self.queue.get(sent.queue_id).await? {
            Some(current) if current.payload == sent.payload => {
                self.queue.delete(current.queue_id).await?;
                self.notes
                    .update_after_sync(&sent.note_id, server_id, server_updated_at)
                    .await?;
                Ok(PushCompletion::Synced)
            }
            Some(current) => {
                let payload = current.payload.with_server_id(server_id);
                self.queue
                    .rewrite(current.queue_id, QueueOperation::Update, &payload)
                    .await?;
                self.notes
                    .record_server_identity(&sent.note_id, server_id, server_updated_at)
                    .await?;
                tracing::debug!(note = %sent.note_id, "Entry edited in flight, keeping it queued");
                Ok(PushCompletion::Superseded)
            }
            None => {
                let note_gone = self.notes.get(&sent.note_id).await?.is_none();
                if note_gone && sent.operation == QueueOperation::Create {
                    Ok(PushCompletion::OrphanedCreate {
                        server_id: server_id.to_string(),
                    })
                } else {
                    Ok(PushCompletion::Detached)
                }
            }
        }
    }
}
