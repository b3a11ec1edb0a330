//! Data models for Jot

mod note;
mod payload;
mod queue;
mod status;

pub use note::{Note, NoteId, NoteType};
pub use payload::{SyncPayload, SYNC_PAYLOAD_VERSION};
pub use queue::{QueueEntry, QueueOperation};
pub use status::{MergeAction, SyncStatus};
