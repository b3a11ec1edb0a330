//! Operation queue store: durable FIFO of pending network intents

use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{NoteId, QueueEntry, QueueOperation, SyncPayload};
use crate::util::unix_millis_now;

const QUEUE_COLUMNS: &str =
    "queue_id, note_local_id, note_server_id, operation, payload, created_at, retry_count, last_error";

/// A queue row whose payload this build cannot decode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableEntry {
    pub queue_id: i64,
    pub note_id: NoteId,
    pub operation: QueueOperation,
    pub reason: String,
}

enum StoredRow {
    Entry(QueueEntry),
    Unreadable(UnreadableEntry),
}

/// libSQL-backed queue table. Ordering is by `queue_id`, which only grows.
pub struct QueueStore<'a> {
    conn: &'a Connection,
}

impl<'a> QueueStore<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_row(row: &Row) -> Result<StoredRow> {
        let note_id: String = row.get(1)?;
        let note_id: NoteId = note_id
            .parse()
            .map_err(|_| Error::Database(format!("invalid note id '{note_id}'")))?;
        let operation: QueueOperation = row.get::<String>(3)?.parse()?;
        let queue_id: i64 = row.get(0)?;

        let payload = match SyncPayload::decode(&row.get::<String>(4)?) {
            Ok(payload) => payload,
            Err(error) => {
                return Ok(StoredRow::Unreadable(UnreadableEntry {
                    queue_id,
                    note_id,
                    operation,
                    reason: error.to_string(),
                }))
            }
        };

        let retry_count: i64 = row.get(6)?;
        Ok(StoredRow::Entry(QueueEntry {
            queue_id,
            note_id,
            note_server_id: row.get::<Option<String>>(2)?,
            operation,
            payload,
            created_at: row.get(5)?,
            retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
            last_error: row.get::<Option<String>>(7)?,
        }))
    }

    async fn query_rows(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<StoredRow>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut parsed = Vec::new();
        while let Some(row) = rows.next().await? {
            parsed.push(Self::parse_row(&row)?);
        }
        Ok(parsed)
    }

    /// Readable entries only; unreadable rows wait for [`Self::remove_unreadable`]
    async fn query_entries(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<QueueEntry>> {
        let rows = self.query_rows(sql, params).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match row {
                StoredRow::Entry(entry) => Some(entry),
                StoredRow::Unreadable(skipped) => {
                    tracing::debug!(
                        queue_id = skipped.queue_id,
                        note = %skipped.note_id,
                        "Skipping unreadable queue entry"
                    );
                    None
                }
            })
            .collect())
    }

    /// Delete rows whose payload cannot be decoded, for one note or the whole queue
    pub async fn remove_unreadable(
        &self,
        note_id: Option<&NoteId>,
    ) -> Result<Vec<UnreadableEntry>> {
        let rows = match note_id {
            Some(note_id) => {
                self.query_rows(
                    &format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE note_local_id = ?"),
                    [note_id.as_str()],
                )
                .await?
            }
            None => {
                self.query_rows(&format!("SELECT {QUEUE_COLUMNS} FROM sync_queue"), ())
                    .await?
            }
        };

        let mut removed = Vec::new();
        for row in rows {
            if let StoredRow::Unreadable(unreadable) = row {
                self.delete(unreadable.queue_id).await?;
                removed.push(unreadable);
            }
        }
        Ok(removed)
    }

    /// Append a new entry at the tail of the queue
    pub async fn insert(
        &self,
        note_id: &NoteId,
        operation: QueueOperation,
        payload: &SyncPayload,
    ) -> Result<QueueEntry> {
        let created_at = unix_millis_now();
        self.conn
            .execute(
                "INSERT INTO sync_queue (note_local_id, note_server_id, operation, payload, created_at)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    note_id.as_str(),
                    payload.server_id.clone(),
                    operation.as_str(),
                    payload.encode()?,
                    created_at
                ],
            )
            .await?;

        Ok(QueueEntry {
            queue_id: self.conn.last_insert_rowid(),
            note_id: *note_id,
            note_server_id: payload.server_id.clone(),
            operation,
            payload: payload.clone(),
            created_at,
            retry_count: 0,
            last_error: None,
        })
    }

    pub async fn get(&self, queue_id: i64) -> Result<Option<QueueEntry>> {
        let entries = self
            .query_entries(
                &format!("SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE queue_id = ?"),
                [queue_id],
            )
            .await?;
        Ok(entries.into_iter().next())
    }

    /// The live entry for a note, if any
    pub async fn latest_for_note(&self, note_id: &NoteId) -> Result<Option<QueueEntry>> {
        let entries = self
            .query_entries(
                &format!(
                    "SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE note_local_id = ?
                     ORDER BY queue_id DESC LIMIT 1"
                ),
                [note_id.as_str()],
            )
            .await?;
        Ok(entries.into_iter().next())
    }

    /// Up to `limit` entries from the head of the queue
    pub async fn head(&self, limit: usize) -> Result<Vec<QueueEntry>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_entries(
            &format!("SELECT {QUEUE_COLUMNS} FROM sync_queue ORDER BY queue_id ASC LIMIT ?"),
            [limit],
        )
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT COUNT(*) FROM sync_queue", ())
            .await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Replace an entry's operation and payload without moving it in the queue
    pub async fn rewrite(
        &self,
        queue_id: i64,
        operation: QueueOperation,
        payload: &SyncPayload,
    ) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_queue SET operation = ?, payload = ?, note_server_id = ?
                 WHERE queue_id = ?",
                params![
                    operation.as_str(),
                    payload.encode()?,
                    payload.server_id.clone(),
                    queue_id
                ],
            )
            .await?;
        Ok(())
    }

    /// Count a failed attempt and remember why
    pub async fn mark_failed(&self, queue_id: i64, error: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_queue SET retry_count = retry_count + 1, last_error = ?
                 WHERE queue_id = ?",
                params![error, queue_id],
            )
            .await?;
        Ok(())
    }

    pub async fn delete(&self, queue_id: i64) -> Result<()> {
        self.conn
            .execute("DELETE FROM sync_queue WHERE queue_id = ?", [queue_id])
            .await?;
        Ok(())
    }

    pub async fn delete_for_note(&self, note_id: &NoteId) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM sync_queue WHERE note_local_id = ?",
                [note_id.as_str()],
            )
            .await?;
        Ok(())
    }
}
