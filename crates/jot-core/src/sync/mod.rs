//! Offline-first synchronization engine
//!
//! Leaves first: the [`ReachabilityGate`] decides whether a network call is
//! worth attempting, the [`QueueManager`] keeps one pending intent per note,
//! the [`SyncExecutor`] turns one intent into one remote call, and the
//! [`SyncWorker`] drains the queue in order. [`merge`] folds fetched remote
//! notes into the local store and detects conflicts.

mod executor;
pub mod merge;
mod queue_manager;
mod reachability;
mod signals;
mod worker;

pub use executor::{SyncExecutor, SyncOutcome, MISSING_SERVER_ID};
pub use merge::{merge_remote_notes, MergeReport};
pub use queue_manager::{EnqueueOutcome, PushCompletion, QueueManager};
pub use reachability::ReachabilityGate;
pub use signals::{SyncEvent, SyncSignals};
pub use worker::{PushAttempt, SyncTrigger, SyncWorker, SyncWorkerHandle, WorkerSignal};
