use std::path::Path;

use crate::cli::KeepSide;
use crate::commands::common::{open_workspace, resolve_note};
use crate::error::CliError;

pub async fn run_resolve(id: &str, keep: KeepSide, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    if keep == KeepSide::Remote && !workspace.sync_enabled {
        return Err(CliError::SyncNotConfigured);
    }

    let note = resolve_note(id, &workspace.repo).await?;
    let resolved = workspace
        .repo
        .resolve_conflict(&note.id, keep == KeepSide::Local)
        .await?;

    let side = match keep {
        KeepSide::Local => "local",
        KeepSide::Remote => "remote",
    };
    println!("{} kept {side} version ({})", resolved.id, resolved.sync_status);
    Ok(())
}
