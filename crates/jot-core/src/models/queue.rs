//! Operation queue model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{NoteId, SyncPayload};
use crate::error::Error;

/// Network intent recorded for a note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueOperation {
    Create,
    Update,
    Delete,
}

impl QueueOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for QueueOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueOperation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::Database(format!("unknown queue operation '{other}'"))),
        }
    }
}

/// A pending network intent. At most one live entry exists per note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    /// Monotonically increasing; insertion order is priority
    pub queue_id: i64,
    pub note_id: NoteId,
    /// Server id snapshot taken at enqueue time
    pub note_server_id: Option<String>,
    pub operation: QueueOperation,
    pub payload: SyncPayload,
    /// Enqueue time (Unix ms)
    pub created_at: i64,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Server id to act on, preferring the payload snapshot over the column
    pub fn server_id(&self) -> Option<&str> {
        self.payload
            .server_id
            .as_deref()
            .or(self.note_server_id.as_deref())
    }
}
