//! Database layer for Jot

mod connection;
mod migrations;
mod note_store;
mod queue_store;

pub use connection::{finish_transaction, Database};
pub use note_store::LocalNoteStore;
pub use queue_store::{QueueStore, UnreadableEntry};
