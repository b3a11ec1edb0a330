//! Sync worker: drains the queue in order and runs as a background task
//!
//! One pass reads up to `batch_size` entries, pushes them one at a time and
//! folds each outcome back into storage. The background loop decides when a
//! pass runs: periodic ticks, device reconnection, post-write hints, manual
//! requests and retry timers all end up as a [`SyncTrigger`].

use std::future;
use std::sync::Arc;

use libsql::Connection;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::{
    PushCompletion, QueueManager, ReachabilityGate, SyncEvent, SyncExecutor, SyncOutcome,
    SyncSignals,
};
use crate::config::SyncSettings;
use crate::db::{finish_transaction, Database, LocalNoteStore, UnreadableEntry};
use crate::error::{Error, Result};
use crate::models::{NoteId, QueueEntry, SyncStatus};
use crate::remote::RemoteNoteApi;
use crate::state::SyncState;

const TRIGGER_CAPACITY: usize = 16;

/// Result of one pass, consumed by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    Success,
    /// Something failed or the server was not reachable; run again later
    Retry,
}

/// Why a pass was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Periodic,
    Reconnected,
    LocalChange,
    Manual,
    Retry,
}

/// Result of an immediate post-write push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAttempt {
    Pushed,
    /// A pass holds the sync lock; the change is left to the worker
    Busy,
    /// Nothing to push, or the server should not be called right now
    Skipped,
}

/// What applying one outcome left behind
enum Applied {
    Done,
    Failed,
    Orphaned(String),
}

/// Queue drainer shared by the background loop and immediate pushes
pub struct SyncWorker<A> {
    db: Arc<Mutex<Database>>,
    gate: Arc<ReachabilityGate>,
    executor: SyncExecutor<A>,
    settings: SyncSettings,
    sync_lock: Arc<Mutex<()>>,
    signals: Arc<SyncSignals>,
}

impl<A> Clone for SyncWorker<A> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            gate: Arc::clone(&self.gate),
            executor: self.executor.clone(),
            settings: self.settings.clone(),
            sync_lock: Arc::clone(&self.sync_lock),
            signals: Arc::clone(&self.signals),
        }
    }
}

impl<A: RemoteNoteApi> SyncWorker<A> {
    pub fn new(
        db: Arc<Mutex<Database>>,
        gate: Arc<ReachabilityGate>,
        executor: SyncExecutor<A>,
        settings: SyncSettings,
        signals: Arc<SyncSignals>,
    ) -> Self {
        Self {
            db,
            gate,
            executor,
            settings,
            sync_lock: Arc::new(Mutex::new(())),
            signals,
        }
    }

    /// Run one pass over the head of the queue
    pub async fn run_once(&self) -> Result<WorkerSignal> {
        let _pass = self.sync_lock.lock().await;
        let result = self.drain().await;
        if let Err(error) = &result {
            tracing::error!("Sync pass aborted: {error}");
            self.signals.set_state(SyncState::Error);
        }
        result
    }

    /// Push one note's entry right away, unless a pass is already running
    pub async fn try_push(&self, note_id: &NoteId) -> Result<PushAttempt> {
        let Ok(_pass) = self.sync_lock.try_lock() else {
            return Ok(PushAttempt::Busy);
        };
        if !self.gate.should_attempt_server_call() {
            return Ok(PushAttempt::Skipped);
        }

        let entry = {
            let db = self.db.lock().await;
            QueueManager::new(db.connection())
                .entry_for_note(note_id)
                .await?
        };
        let Some(entry) = entry else {
            return Ok(PushAttempt::Skipped);
        };

        let failed = self.process(entry.queue_id).await?;
        self.publish().await?;
        if failed {
            tracing::debug!(note = %note_id, "Immediate push failed, left queued");
        }
        Ok(PushAttempt::Pushed)
    }

    /// Hold off passes and immediate pushes while the caller reconciles with the server
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.sync_lock.lock().await
    }

    async fn drain(&self) -> Result<WorkerSignal> {
        let (unreadable, batch) = {
            let db = self.db.lock().await;
            let queue = QueueManager::new(db.connection());
            (
                queue.quarantine_unreadable().await?,
                queue.pending_operations(self.settings.batch_size).await?,
            )
        };
        if !unreadable.is_empty() {
            for entry in unreadable {
                self.drop_unreadable(entry);
            }
            self.publish().await?;
        }

        if batch.is_empty() {
            self.signals.set_state(SyncState::Synced);
            return Ok(WorkerSignal::Success);
        }
        if !self.gate.should_attempt_server_call() {
            self.signals.set_state(SyncState::Offline);
            return Ok(WorkerSignal::Retry);
        }

        self.signals.set_state(SyncState::Syncing);
        let mut failures = 0usize;
        let mut processed = 0usize;
        for queued in &batch {
            // The server went away mid-pass; the rest waits for the next one
            if !self.gate.should_attempt_server_call() {
                failures += 1;
                break;
            }
            if self.process(queued.queue_id).await? {
                failures += 1;
            }
            processed += 1;
        }

        self.publish().await?;
        tracing::info!(processed, failures, "Sync pass finished");

        if failures == 0 {
            self.signals.set_state(SyncState::Synced);
            Ok(WorkerSignal::Success)
        } else {
            let state = if self.gate.should_attempt_server_call() {
                SyncState::Error
            } else {
                SyncState::Offline
            };
            self.signals.set_state(state);
            Ok(WorkerSignal::Retry)
        }
    }

    /// Handle one entry; returns whether it failed and stays queued
    async fn process(&self, queue_id: i64) -> Result<bool> {
        // Re-read: the entry may have been coalesced or consumed since the batch was read
        let entry = {
            let db = self.db.lock().await;
            QueueManager::new(db.connection()).entry(queue_id).await?
        };
        let Some(entry) = entry else {
            return Ok(false);
        };

        if entry.retry_count >= self.settings.max_retries {
            self.abandon(&entry).await?;
            return Ok(false);
        }

        let outcome = self.executor.execute(&entry).await;
        tracing::debug!(note = %entry.note_id, op = %entry.operation, ?outcome, "Pushed entry");

        let applied = {
            let db = self.db.lock().await;
            let tx = db.begin().await?;
            let result = apply_outcome(&tx, &entry, outcome).await;
            finish_transaction(tx, result).await?
        };

        match applied {
            Applied::Done => Ok(false),
            Applied::Failed => Ok(true),
            Applied::Orphaned(server_id) => {
                tracing::info!(note = %entry.note_id, %server_id, "Deleting server copy of a note removed during its create");
                if let SyncOutcome::Failure(message) =
                    self.executor.execute_delete(Some(&server_id)).await
                {
                    tracing::warn!(%server_id, "Could not delete orphaned server note: {message}");
                }
                Ok(false)
            }
        }
    }

    async fn abandon(&self, entry: &QueueEntry) -> Result<()> {
        {
            let db = self.db.lock().await;
            QueueManager::new(db.connection())
                .mark_operation_complete(entry.queue_id)
                .await?;
        }

        tracing::warn!(
            note = %entry.note_id,
            op = %entry.operation,
            retries = entry.retry_count,
            last_error = ?entry.last_error,
            "Dropping queue entry after exhausting retries; the change was not synced"
        );
        self.signals.emit(SyncEvent::Abandoned {
            note_id: entry.note_id,
            operation: entry.operation,
            last_error: entry.last_error.clone(),
        });
        Ok(())
    }

    fn drop_unreadable(&self, entry: UnreadableEntry) {
        tracing::warn!(
            note = %entry.note_id,
            op = %entry.operation,
            "Dropping queue entry that cannot be decoded; the change was not synced: {}",
            entry.reason
        );
        self.signals.emit(SyncEvent::Abandoned {
            note_id: entry.note_id,
            operation: entry.operation,
            last_error: Some(entry.reason),
        });
    }

    async fn publish(&self) -> Result<()> {
        let db = self.db.lock().await;
        self.signals.publish(db.connection()).await
    }

    /// Start the background loop. `connectivity` reports device-level
    /// connectivity; each flip to `true` triggers a pass.
    pub fn spawn(self, connectivity: Option<watch::Receiver<bool>>) -> SyncWorkerHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_CAPACITY);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(self.run_loop(trigger_rx, connectivity, shutdown_rx));
        SyncWorkerHandle {
            trigger_tx,
            shutdown_tx,
            join,
        }
    }

    async fn run_loop(
        self,
        mut triggers: mpsc::Receiver<SyncTrigger>,
        mut connectivity: Option<watch::Receiver<bool>>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        if let Some(rx) = connectivity.as_mut() {
            self.gate.set_device_connected(*rx.borrow_and_update());
        }

        let mut ticker = tokio::time::interval(self.settings.periodic_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut consecutive_retries = 0u32;
        let mut retry_at: Option<Instant> = None;

        tracing::info!("Sync worker started");
        loop {
            let trigger = tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => SyncTrigger::Periodic,
                received = triggers.recv() => match received {
                    Some(trigger) => trigger,
                    None => break,
                },
                changed = connectivity_changed(&mut connectivity) => match changed {
                    Some(connected) => {
                        if self.gate.set_device_connected(connected) {
                            SyncTrigger::Reconnected
                        } else {
                            continue;
                        }
                    }
                    None => {
                        connectivity = None;
                        continue;
                    }
                },
                () = sleep_until(retry_at) => SyncTrigger::Retry,
            };

            // Everything queued up so far is served by this one pass
            while triggers.try_recv().is_ok() {}

            tracing::debug!(?trigger, "Starting sync pass");
            match self.run_once().await {
                Ok(WorkerSignal::Success) => {
                    consecutive_retries = 0;
                    retry_at = None;
                }
                Ok(WorkerSignal::Retry) | Err(_) => {
                    let delay = self.settings.backoff_delay(consecutive_retries);
                    consecutive_retries = consecutive_retries.saturating_add(1);
                    retry_at = Some(Instant::now() + delay);
                    tracing::debug!(?delay, "Sync pass will be retried");
                }
            }
        }
        tracing::info!("Sync worker stopped");
    }
}

/// Apply one executor outcome inside the caller's transaction
async fn apply_outcome(
    conn: &Connection,
    entry: &QueueEntry,
    outcome: SyncOutcome,
) -> Result<Applied> {
    let queue = QueueManager::new(conn);
    match outcome {
        SyncOutcome::Success {
            server_id,
            server_updated_at,
        } => match queue
            .complete_push(entry, &server_id, &server_updated_at)
            .await?
        {
            PushCompletion::OrphanedCreate { server_id } => Ok(Applied::Orphaned(server_id)),
            PushCompletion::Synced | PushCompletion::Superseded | PushCompletion::Detached => {
                Ok(Applied::Done)
            }
        },
        SyncOutcome::Conflict => {
            // Entry replaced by a delete while the request was out
            if queue.entry(entry.queue_id).await?.is_none() {
                return Ok(Applied::Done);
            }
            tracing::info!(note = %entry.note_id, "Server reported a conflicting version");
            LocalNoteStore::new(conn)
                .update_sync_status(&entry.note_id, SyncStatus::Conflict)
                .await?;
            queue.mark_operation_complete(entry.queue_id).await?;
            Ok(Applied::Done)
        }
        SyncOutcome::Failure(message) => {
            queue.mark_operation_failed(entry.queue_id, &message).await?;
            Ok(Applied::Failed)
        }
        SyncOutcome::Deleted => {
            LocalNoteStore::new(conn).delete(&entry.note_id).await?;
            queue.mark_operation_complete(entry.queue_id).await?;
            Ok(Applied::Done)
        }
    }
}

async fn connectivity_changed(rx: &mut Option<watch::Receiver<bool>>) -> Option<bool> {
    match rx {
        Some(rx) => rx.changed().await.ok().map(|()| *rx.borrow_and_update()),
        None => future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Control handle for a spawned worker
pub struct SyncWorkerHandle {
    trigger_tx: mpsc::Sender<SyncTrigger>,
    shutdown_tx: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

impl SyncWorkerHandle {
    /// Ask for a pass. Returns false once the worker has stopped.
    pub fn trigger(&self, trigger: SyncTrigger) -> bool {
        // A full channel already guarantees a pass
        !matches!(
            self.trigger_tx.try_send(trigger),
            Err(TrySendError::Closed(_))
        )
    }

    /// A sender other components can use to request passes
    pub fn sender(&self) -> mpsc::Sender<SyncTrigger> {
        self.trigger_tx.clone()
    }

    /// Stop the loop after any in-flight pass completes
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(());
        self.join
            .await
            .map_err(|error| Error::Sync(format!("sync worker task failed: {error}")))
    }
}
