//! jot-core - Core library for Jot
//!
//! This crate contains the offline-first sync engine used by every Jot
//! interface: the local note store, the coalescing operation queue, the
//! reachability gate, and the repository facade that ties them together.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod repository;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Note, NoteId, NoteType, SyncStatus};
pub use repository::NoteRepository;
