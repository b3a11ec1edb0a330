//! Folding fetched remote notes into the local store
//!
//! Two versions per note only: the local row and the fetched remote copy.
//! The decision for an existing row comes from [`SyncStatus::on_remote`].

use libsql::Connection;

use crate::db::{LocalNoteStore, QueueStore};
use crate::error::Result;
use crate::models::{MergeAction, Note};
use crate::remote::RemoteNote;

/// Counts of what a merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub inserted: usize,
    pub overwritten: usize,
    pub conflicts: usize,
    pub kept: usize,
}

/// Merge a batch of remote notes. Caller holds the database lock.
pub async fn merge_remote_notes(conn: &Connection, remote_notes: &[RemoteNote]) -> Result<MergeReport> {
    let notes = LocalNoteStore::new(conn);
    let queue = QueueStore::new(conn);
    let mut report = MergeReport::default();

    for remote in remote_notes {
        let Some(mut local) = notes.get_by_server_id(&remote.id).await? else {
            notes.insert(&Note::from_remote(remote)).await?;
            report.inserted += 1;
            continue;
        };

        let server_changed = local.server_updated_at.as_deref() != Some(remote.updated_at.as_str());
        match local.sync_status.on_remote(server_changed) {
            MergeAction::Overwrite => {
                local.apply_remote(remote);
                notes.save(&local).await?;
                report.overwritten += 1;
            }
            MergeAction::MarkConflict => {
                tracing::info!(
                    note = %local.id,
                    local = ?local.server_updated_at,
                    remote = %remote.updated_at,
                    "Server changed a note with pending local edits"
                );
                notes.mark_conflict(&local.id, &remote.updated_at).await?;
                queue.delete_for_note(&local.id).await?;
                report.conflicts += 1;
            }
            MergeAction::Keep => {
                report.kept += 1;
            }
        }
    }

    if report != MergeReport::default() {
        tracing::debug!(?report, "Merged remote notes");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{NoteType, QueueOperation, SyncStatus};
    use pretty_assertions::assert_eq;

    fn remote(id: &str, content: &str, updated_at: &str) -> RemoteNote {
        RemoteNote {
            id: id.to_string(),
            content: content.to_string(),
            note_type: NoteType::Note,
            is_archived: false,
            created_at: "t0".to_string(),
            updated_at: updated_at.to_string(),
        }
    }

    async fn local(db: &Database, server_id: &str, status: SyncStatus) -> Note {
        let mut note = Note::new("local content", NoteType::Note);
        note.server_id = Some(server_id.to_string());
        note.server_updated_at = Some("t1".to_string());
        note.sync_status = status;
        LocalNoteStore::new(db.connection())
            .insert(&note)
            .await
            .unwrap();
        note
    }

    async fn reload(db: &Database, note: &Note) -> Note {
        LocalNoteStore::new(db.connection())
            .get(&note.id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unknown_remote_note_is_inserted_synced() {
        let db = Database::open_in_memory().await.unwrap();

        let report = merge_remote_notes(db.connection(), &[remote("srv-1", "new", "t1")])
            .await
            .unwrap();
        assert_eq!(report.inserted, 1);

        let stored = LocalNoteStore::new(db.connection())
            .get_by_server_id("srv-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sync_status, SyncStatus::Synced);
        assert_eq!(stored.server_updated_at.as_deref(), Some("t1"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn synced_note_takes_server_content() {
        let db = Database::open_in_memory().await.unwrap();
        let note = local(&db, "srv-1", SyncStatus::Synced).await;

        merge_remote_notes(db.connection(), &[remote("srv-1", "server edit", "t2")])
            .await
            .unwrap();

        let stored = reload(&db, &note).await;
        assert_eq!(stored.content, "server edit");
        assert_eq!(stored.server_updated_at.as_deref(), Some("t2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_update_with_newer_server_copy_conflicts() {
        let db = Database::open_in_memory().await.unwrap();
        let note = local(&db, "srv-1", SyncStatus::PendingUpdate).await;
        QueueStore::new(db.connection())
            .insert(&note.id, QueueOperation::Update, &note.payload())
            .await
            .unwrap();

        let report = merge_remote_notes(db.connection(), &[remote("srv-1", "server edit", "t2")])
            .await
            .unwrap();
        assert_eq!(report.conflicts, 1);

        let stored = reload(&db, &note).await;
        assert_eq!(stored.sync_status, SyncStatus::Conflict);
        assert_eq!(stored.content, "local content");
        assert_eq!(QueueStore::new(db.connection()).count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_update_with_same_server_copy_is_kept() {
        let db = Database::open_in_memory().await.unwrap();
        let note = local(&db, "srv-1", SyncStatus::PendingUpdate).await;

        merge_remote_notes(db.connection(), &[remote("srv-1", "server", "t1")])
            .await
            .unwrap();

        let stored = reload(&db, &note).await;
        assert_eq!(stored.sync_status, SyncStatus::PendingUpdate);
        assert_eq!(stored.content, "local content");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_delete_and_conflict_ignore_remote() {
        let db = Database::open_in_memory().await.unwrap();
        let deleting = local(&db, "srv-1", SyncStatus::PendingDelete).await;
        let conflicted = local(&db, "srv-2", SyncStatus::Conflict).await;

        let report = merge_remote_notes(
            db.connection(),
            &[remote("srv-1", "server", "t9"), remote("srv-2", "server", "t9")],
        )
        .await
        .unwrap();
        assert_eq!(report.kept, 2);

        assert_eq!(reload(&db, &deleting).await, deleting);
        assert_eq!(reload(&db, &conflicted).await, conflicted);
    }
}
