//! Sync status state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Where a note stands relative to the server. Exactly one per note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    Synced,
    PendingCreate,
    PendingUpdate,
    PendingDelete,
    Conflict,
}

/// What the merge step does with a fetched remote copy of a local note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Replace local fields with the server's and mark `SYNCED`
    Overwrite,
    /// Keep local content and mark `CONFLICT`
    MarkConflict,
    /// Leave the local row untouched
    Keep,
}

impl SyncStatus {
    pub const ALL: [Self; 5] = [
        Self::Synced,
        Self::PendingCreate,
        Self::PendingUpdate,
        Self::PendingDelete,
        Self::Conflict,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Synced => "SYNCED",
            Self::PendingCreate => "PENDING_CREATE",
            Self::PendingUpdate => "PENDING_UPDATE",
            Self::PendingDelete => "PENDING_DELETE",
            Self::Conflict => "CONFLICT",
        }
    }

    /// Merge transition table for a fetched remote copy.
    ///
    /// `server_changed` is true when the fetched `updatedAt` differs from the
    /// locally recorded `server_updated_at`. The comparison is plain string
    /// equality.
    pub const fn on_remote(self, server_changed: bool) -> MergeAction {
        match (self, server_changed) {
            (Self::Synced, _) => MergeAction::Overwrite,
            (Self::PendingCreate | Self::PendingUpdate, true) => MergeAction::MarkConflict,
            (Self::PendingCreate | Self::PendingUpdate, false)
            | (Self::PendingDelete | Self::Conflict, _) => MergeAction::Keep,
        }
    }

    /// Whether a note without a server id may hold this status
    pub const fn allowed_without_server_id(self) -> bool {
        matches!(self, Self::PendingCreate)
    }

    pub const fn is_pending(self) -> bool {
        matches!(
            self,
            Self::PendingCreate | Self::PendingUpdate | Self::PendingDelete
        )
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| Error::Database(format!("unknown sync status '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_table_covers_every_status_and_event() {
        let expected = [
            (SyncStatus::Synced, false, MergeAction::Overwrite),
            (SyncStatus::Synced, true, MergeAction::Overwrite),
            (SyncStatus::PendingCreate, false, MergeAction::Keep),
            (SyncStatus::PendingCreate, true, MergeAction::MarkConflict),
            (SyncStatus::PendingUpdate, false, MergeAction::Keep),
            (SyncStatus::PendingUpdate, true, MergeAction::MarkConflict),
            (SyncStatus::PendingDelete, false, MergeAction::Keep),
            (SyncStatus::PendingDelete, true, MergeAction::Keep),
            (SyncStatus::Conflict, false, MergeAction::Keep),
            (SyncStatus::Conflict, true, MergeAction::Keep),
        ];

        assert_eq!(expected.len(), SyncStatus::ALL.len() * 2);
        for (status, server_changed, action) in expected {
            assert_eq!(
                status.on_remote(server_changed),
                action,
                "{status} with server_changed={server_changed}"
            );
        }
    }

    #[test]
    fn only_pending_create_allowed_without_server_id() {
        let allowed: Vec<_> = SyncStatus::ALL
            .into_iter()
            .filter(|status| status.allowed_without_server_id())
            .collect();
        assert_eq!(allowed, vec![SyncStatus::PendingCreate]);
    }

    #[test]
    fn status_string_roundtrip() {
        for status in SyncStatus::ALL {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
        assert!("DIRTY".parse::<SyncStatus>().is_err());
    }
}
