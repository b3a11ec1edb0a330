//! Note model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{SyncPayload, SyncStatus};
use crate::error::Error;
use crate::remote::RemoteNote;
use crate::util::{next_local_timestamp, rfc3339_now, unix_millis_now};

/// A unique local identifier for a note, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new unique note ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Category a note belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteType {
    #[default]
    Note,
    Todo,
    Idea,
    Journal,
}

impl NoteType {
    pub const ALL: [Self; 4] = [Self::Note, Self::Todo, Self::Idea, Self::Journal];

    /// Storage and wire representation
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Todo => "todo",
            Self::Idea => "idea",
            Self::Journal => "journal",
        }
    }
}

impl fmt::Display for NoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NoteType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|note_type| note_type.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown note type '{s}'")))
    }
}

/// A note as stored on this device, with its sync metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Client-generated identity, stable for the lifetime of the note
    pub id: NoteId,
    /// Identity assigned by the server once the note has been created there
    pub server_id: Option<String>,
    /// Plain text content
    pub content: String,
    pub note_type: NoteType,
    pub is_archived: bool,
    /// Display timestamps (RFC 3339)
    pub created_at: String,
    pub updated_at: String,
    /// Server `updatedAt` as of the last successful sync
    pub server_updated_at: Option<String>,
    /// Monotonic local write time (Unix ms)
    pub local_updated_at: i64,
    pub sync_status: SyncStatus,
}

impl Note {
    /// Create a new, never-synced note with the given content
    #[must_use]
    pub fn new(content: impl Into<String>, note_type: NoteType) -> Self {
        let now = rfc3339_now();
        Self {
            id: NoteId::new(),
            server_id: None,
            content: content.into(),
            note_type,
            is_archived: false,
            created_at: now.clone(),
            updated_at: now,
            server_updated_at: None,
            local_updated_at: unix_millis_now(),
            sync_status: SyncStatus::PendingCreate,
        }
    }

    /// Build a synced local copy of a note fetched from the server
    #[must_use]
    pub fn from_remote(remote: &RemoteNote) -> Self {
        Self {
            id: NoteId::new(),
            server_id: Some(remote.id.clone()),
            content: remote.content.clone(),
            note_type: remote.note_type,
            is_archived: remote.is_archived,
            created_at: remote.created_at.clone(),
            updated_at: remote.updated_at.clone(),
            server_updated_at: Some(remote.updated_at.clone()),
            local_updated_at: unix_millis_now(),
            sync_status: SyncStatus::Synced,
        }
    }

    /// Overwrite every user-visible field with the server's copy and mark synced
    pub fn apply_remote(&mut self, remote: &RemoteNote) {
        self.server_id = Some(remote.id.clone());
        self.content.clone_from(&remote.content);
        self.note_type = remote.note_type;
        self.is_archived = remote.is_archived;
        self.created_at.clone_from(&remote.created_at);
        self.updated_at.clone_from(&remote.updated_at);
        self.server_updated_at = Some(remote.updated_at.clone());
        self.local_updated_at = next_local_timestamp(self.local_updated_at);
        self.sync_status = SyncStatus::Synced;
    }

    /// Record a local edit: bumps both the display and the monotonic write time
    pub fn touch(&mut self) {
        self.updated_at = rfc3339_now();
        self.local_updated_at = next_local_timestamp(self.local_updated_at);
    }

    /// Snapshot of the fields the server stores
    #[must_use]
    pub fn payload(&self) -> SyncPayload {
        SyncPayload::new(
            self.server_id.clone(),
            self.content.clone(),
            self.note_type,
            self.is_archived,
        )
    }

    /// Get first line as title preview, truncated to `max_len` characters
    #[must_use]
    pub fn title_preview(&self, max_len: usize) -> String {
        self.content
            .lines()
            .next()
            .unwrap_or("")
            .chars()
            .take(max_len)
            .collect()
    }
}
