//! Queued sync payload
//!
//! The payload is persisted as JSON in the queue table and may outlive the
//! process that wrote it, so its schema is spelled out here field by field:
//!
//! ```json
//! {"v":1,"serverId":"abc"|null,"content":"...","type":"note","isArchived":false}
//! ```
//!
//! `serverId` may be absent. Unknown fields are ignored so entries written by
//! a newer client can still be drained; a newer `v` is rejected.

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use super::NoteType;
use crate::error::Result;

/// Highest payload schema version this build understands
pub const SYNC_PAYLOAD_VERSION: u32 = 1;

/// Immutable snapshot of the server-visible fields of a note at enqueue time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPayload {
    #[serde(rename = "v", default = "default_version")]
    pub version: u32,
    #[serde(rename = "serverId", default)]
    pub server_id: Option<String>,
    #[serde(rename = "content")]
    pub content: String,
    #[serde(rename = "type")]
    pub note_type: NoteType,
    #[serde(rename = "isArchived", default)]
    pub is_archived: bool,
}

const fn default_version() -> u32 {
    SYNC_PAYLOAD_VERSION
}

impl SyncPayload {
    pub const fn new(
        server_id: Option<String>,
        content: String,
        note_type: NoteType,
        is_archived: bool,
    ) -> Self {
        Self {
            version: SYNC_PAYLOAD_VERSION,
            server_id,
            content,
            note_type,
            is_archived,
        }
    }

    /// Copy of this payload pointing at a (newly assigned) server id
    #[must_use]
    pub fn with_server_id(&self, server_id: impl Into<String>) -> Self {
        Self {
            server_id: Some(server_id.into()),
            ..self.clone()
        }
    }

    /// Serialize for storage in the queue
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a stored payload
    pub fn decode(raw: &str) -> Result<Self> {
        let payload: Self = serde_json::from_str(raw)?;
        if payload.version > SYNC_PAYLOAD_VERSION {
            return Err(serde_json::Error::custom(format!(
                "unsupported sync payload version {} (max {SYNC_PAYLOAD_VERSION})",
                payload.version
            ))
            .into());
        }
        Ok(payload)
    }
}
