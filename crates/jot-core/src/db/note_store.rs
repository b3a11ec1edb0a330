//! Local note store: persistence and queries, no sync decisions

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{Note, NoteId, NoteType, SyncStatus};

const NOTE_COLUMNS: &str = "local_id, server_id, content, note_type, is_archived, created_at, \
                            updated_at, server_updated_at, local_updated_at, sync_status";

/// libSQL-backed table of notes and their sync metadata
pub struct LocalNoteStore<'a> {
    conn: &'a Connection,
}

impl<'a> LocalNoteStore<'a> {
    /// Create a new store over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row
    fn parse_note(row: &Row) -> Result<Note> {
        let id: String = row.get(0)?;
        let note_type: String = row.get(3)?;
        let sync_status: String = row.get(9)?;
        Ok(Note {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("invalid note id '{id}'")))?,
            server_id: row.get::<Option<String>>(1)?,
            content: row.get(2)?,
            note_type: note_type.parse()?,
            is_archived: row.get::<i32>(4)? != 0,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            server_updated_at: row.get::<Option<String>>(7)?,
            local_updated_at: row.get(8)?,
            sync_status: sync_status.parse()?,
        })
    }

    async fn query_notes(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<Vec<Note>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next().await? {
            notes.push(Self::parse_note(&row)?);
        }
        Ok(notes)
    }

    fn check_invariant(note: &Note) -> Result<()> {
        if note.server_id.is_none() && !note.sync_status.allowed_without_server_id() {
            return Err(Error::InvalidInput(format!(
                "note {} has no server id and cannot be {}",
                note.id, note.sync_status
            )));
        }
        Ok(())
    }

    /// Insert a new note row
    pub async fn insert(&self, note: &Note) -> Result<()> {
        Self::check_invariant(note)?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO notes ({NOTE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    note.id.as_str(),
                    note.server_id.clone(),
                    note.content.as_str(),
                    note.note_type.as_str(),
                    i32::from(note.is_archived),
                    note.created_at.as_str(),
                    note.updated_at.as_str(),
                    note.server_updated_at.clone(),
                    note.local_updated_at,
                    note.sync_status.as_str()
                ],
            )
            .await?;
        Ok(())
    }

    /// Write every column of an existing note
    pub async fn save(&self, note: &Note) -> Result<()> {
        Self::check_invariant(note)?;
        let rows = self
            .conn
            .execute(
                "UPDATE notes SET server_id = ?, content = ?, note_type = ?, is_archived = ?,
                     created_at = ?, updated_at = ?, server_updated_at = ?,
                     local_updated_at = ?, sync_status = ?
                 WHERE local_id = ?",
                params![
                    note.server_id.clone(),
                    note.content.as_str(),
                    note.note_type.as_str(),
                    i32::from(note.is_archived),
                    note.created_at.as_str(),
                    note.updated_at.as_str(),
                    note.server_updated_at.clone(),
                    note.local_updated_at,
                    note.sync_status.as_str(),
                    note.id.as_str()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(note.id.to_string()));
        }
        Ok(())
    }

    /// Get a note by local ID
    pub async fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let notes = self
            .query_notes(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE local_id = ?"),
                [id.as_str()],
            )
            .await?;
        Ok(notes.into_iter().next())
    }

    /// Get a note by the id the server assigned it
    pub async fn get_by_server_id(&self, server_id: &str) -> Result<Option<Note>> {
        let notes = self
            .query_notes(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE server_id = ?"),
                [server_id],
            )
            .await?;
        Ok(notes.into_iter().next())
    }

    /// Notes with the given server ids, skipping unknown ids and pending deletes
    pub async fn list_by_server_ids(&self, server_ids: &[String]) -> Result<Vec<Note>> {
        let mut notes = Vec::with_capacity(server_ids.len());
        for server_id in server_ids {
            if let Some(note) = self.get_by_server_id(server_id).await? {
                if note.sync_status != SyncStatus::PendingDelete {
                    notes.push(note);
                }
            }
        }
        Ok(notes)
    }

    /// List notes of one type and archive state, newest local write first
    pub async fn list(&self, note_type: NoteType, archived: bool) -> Result<Vec<Note>> {
        self.query_notes(
            &format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE note_type = ? AND is_archived = ? AND sync_status != 'PENDING_DELETE'
                 ORDER BY local_updated_at DESC"
            ),
            params![note_type.as_str(), i32::from(archived)],
        )
        .await
    }

    /// Case-insensitive substring search over content
    pub async fn search(&self, term: &str) -> Result<Vec<Note>> {
        self.query_notes(
            &format!(
                "SELECT {NOTE_COLUMNS} FROM notes
                 WHERE instr(lower(content), lower(?)) > 0 AND sync_status != 'PENDING_DELETE'
                 ORDER BY local_updated_at DESC"
            ),
            [term],
        )
        .await
    }

    /// Notes currently holding `status`
    pub async fn list_by_status(&self, status: SyncStatus) -> Result<Vec<Note>> {
        self.query_notes(
            &format!(
                "SELECT {NOTE_COLUMNS} FROM notes WHERE sync_status = ?
                 ORDER BY local_updated_at DESC"
            ),
            [status.as_str()],
        )
        .await
    }

    /// Local ids starting with `prefix`, for resolving short ids
    pub async fn ids_with_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<NoteId>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = self
            .conn
            .query(
                "SELECT local_id FROM notes
                 WHERE substr(local_id, 1, length(?1)) = ?1 AND sync_status != 'PENDING_DELETE'
                 ORDER BY local_id LIMIT ?2",
                params![prefix, limit],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let id: String = row.get(0)?;
            ids.push(
                id.parse()
                    .map_err(|_| Error::Database(format!("invalid note id '{id}'")))?,
            );
        }
        Ok(ids)
    }

    /// Set a note's sync status, refusing statuses a never-synced note cannot hold
    pub async fn update_sync_status(&self, id: &NoteId, status: SyncStatus) -> Result<()> {
        let Some(mut note) = self.get(id).await? else {
            return Err(Error::NotFound(id.to_string()));
        };
        note.sync_status = status;
        Self::check_invariant(&note)?;

        self.conn
            .execute(
                "UPDATE notes SET sync_status = ? WHERE local_id = ?",
                params![status.as_str(), id.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Record a confirmed sync: server id, server timestamp, and `SYNCED` in one write
    pub async fn update_after_sync(
        &self,
        id: &NoteId,
        server_id: &str,
        server_updated_at: &str,
    ) -> Result<()> {
        self.record_server_state(id, server_id, server_updated_at, SyncStatus::Synced)
            .await
    }

    /// Record server identity for a note that still has local changes to push
    pub async fn record_server_identity(
        &self,
        id: &NoteId,
        server_id: &str,
        server_updated_at: &str,
    ) -> Result<()> {
        self.record_server_state(id, server_id, server_updated_at, SyncStatus::PendingUpdate)
            .await
    }

    async fn record_server_state(
        &self,
        id: &NoteId,
        server_id: &str,
        server_updated_at: &str,
        status: SyncStatus,
    ) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE notes SET server_id = ?, server_updated_at = ?, sync_status = ?
                 WHERE local_id = ?",
                params![server_id, server_updated_at, status.as_str(), id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Mark a note conflicted, remembering the server version that caused it
    pub async fn mark_conflict(&self, id: &NoteId, server_updated_at: &str) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE notes SET sync_status = 'CONFLICT', server_updated_at = ?
                 WHERE local_id = ? AND server_id IS NOT NULL",
                params![server_updated_at, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Remove a note row (its queue entry goes with it)
    pub async fn delete(&self, id: &NoteId) -> Result<()> {
        self.conn
            .execute("DELETE FROM notes WHERE local_id = ?", [id.as_str()])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn synced(content: &str, server_id: &str) -> Note {
        let mut note = Note::new(content, NoteType::Note);
        note.server_id = Some(server_id.to_string());
        note.server_updated_at = Some("t1".to_string());
        note.sync_status = SyncStatus::Synced;
        note
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        let note = Note::new("Hello\n\"quoted\" 日本語", NoteType::Idea);
        store.insert(&note).await.unwrap();

        let fetched = store.get(&note.id).await.unwrap().unwrap();
        assert_eq!(fetched, note);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_by_server_id() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        let note = synced("remote", "srv-7");
        store.insert(&note).await.unwrap();

        let fetched = store.get_by_server_id("srv-7").await.unwrap().unwrap();
        assert_eq!(fetched.id, note.id);
        assert!(store.get_by_server_id("srv-8").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_filters_type_archive_and_pending_delete() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        store.insert(&Note::new("plain", NoteType::Note)).await.unwrap();
        store.insert(&Note::new("todo", NoteType::Todo)).await.unwrap();

        let mut archived = Note::new("archived", NoteType::Note);
        archived.is_archived = true;
        store.insert(&archived).await.unwrap();

        let mut deleting = synced("deleting", "srv-1");
        deleting.sync_status = SyncStatus::PendingDelete;
        store.insert(&deleting).await.unwrap();

        let notes = store.list(NoteType::Note, false).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "plain");

        let notes = store.list(NoteType::Note, true).await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].content, "archived");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_is_case_insensitive_substring() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        store.insert(&Note::new("Buy MILK", NoteType::Todo)).await.unwrap();
        store.insert(&Note::new("oat milk latte", NoteType::Note)).await.unwrap();
        store.insert(&Note::new("Something else", NoteType::Note)).await.unwrap();

        let results = store.search("milk").await.unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_after_sync_sets_server_fields() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        let note = Note::new("draft", NoteType::Note);
        store.insert(&note).await.unwrap();
        store
            .update_after_sync(&note.id, "srv-9", "2026-01-01T00:00:00Z")
            .await
            .unwrap();

        let fetched = store.get(&note.id).await.unwrap().unwrap();
        assert_eq!(fetched.server_id.as_deref(), Some("srv-9"));
        assert_eq!(
            fetched.server_updated_at.as_deref(),
            Some("2026-01-01T00:00:00Z")
        );
        assert_eq!(fetched.sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_status_without_server_id_is_rejected() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        let note = Note::new("never sent", NoteType::Note);
        store.insert(&note).await.unwrap();

        for status in [
            SyncStatus::Synced,
            SyncStatus::PendingUpdate,
            SyncStatus::PendingDelete,
            SyncStatus::Conflict,
        ] {
            let error = store.update_sync_status(&note.id, status).await.unwrap_err();
            assert!(matches!(error, Error::InvalidInput(_)), "{status}");
        }

        let mut invalid = Note::new("bad", NoteType::Note);
        invalid.sync_status = SyncStatus::Synced;
        assert!(store.insert(&invalid).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_server_id_is_unique() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        store.insert(&synced("one", "srv-1")).await.unwrap();
        assert!(store.insert(&synced("two", "srv-1")).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ids_with_prefix() {
        let db = setup().await;
        let store = LocalNoteStore::new(db.connection());

        let note = Note::new("findable", NoteType::Note);
        store.insert(&note).await.unwrap();

        let prefix: String = note.id.as_str().chars().take(8).collect();
        let ids = store.ids_with_prefix(&prefix, 3).await.unwrap();
        assert_eq!(ids, vec![note.id]);
    }
}
