use std::path::Path;

use jot_core::sync::{MergeReport, SyncEvent, WorkerSignal};
use jot_core::NoteType;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;

use crate::commands::common::{open_workspace, Workspace};
use crate::error::CliError;

pub async fn run_sync(watch_mode: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    if !workspace.sync_enabled {
        return Err(CliError::SyncNotConfigured);
    }

    if watch_mode {
        run_sync_watch(&workspace).await
    } else {
        run_sync_once(&workspace).await
    }
}

async fn run_sync_once(workspace: &Workspace) -> Result<(), CliError> {
    let repo = &workspace.repo;

    let signal = repo.sync_now().await?;
    let pending = *repo.pending_sync_count().borrow();
    if signal == WorkerSignal::Retry {
        return Err(CliError::SyncIncomplete(pending));
    }

    let mut total = MergeReport::default();
    for note_type in NoteType::ALL {
        for archived in [false, true] {
            let report = repo.refresh(note_type, archived).await?;
            total.inserted += report.inserted;
            total.overwritten += report.overwritten;
            total.conflicts += report.conflicts;
        }
    }

    println!(
        "Sync completed: {} new, {} updated, {} new conflict(s)",
        total.inserted, total.overwritten, total.conflicts
    );
    let conflicts = repo.conflicts().borrow().len();
    if conflicts > 0 {
        println!("{conflicts} note(s) in conflict; see `jot conflicts`");
    }
    Ok(())
}

async fn run_sync_watch(workspace: &Workspace) -> Result<(), CliError> {
    let repo = &workspace.repo;
    let (connectivity_tx, connectivity_rx) = watch::channel(true);
    let handle = repo.start_background_sync(connectivity_rx);

    let mut pending = repo.pending_sync_count();
    let mut state = repo.sync_state();
    let mut events = repo.sync_events();

    println!(
        "Syncing in the background ({} pending); press Ctrl-C to stop",
        *pending.borrow_and_update()
    );
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = pending.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{} change(s) pending", *pending.borrow_and_update());
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("Sync state: {}", state.borrow_and_update().as_str());
            }
            event = events.recv() => match event {
                Ok(SyncEvent::Abandoned { note_id, operation, last_error }) => {
                    eprintln!(
                        "Gave up syncing {operation} of {note_id}: {}",
                        last_error.as_deref().unwrap_or("unknown error")
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {skipped} sync events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await?;
    drop(connectivity_tx);
    println!("Stopped");
    Ok(())
}
