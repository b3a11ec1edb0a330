use std::path::Path;

use crate::commands::common::{open_workspace, resolve_note};
use crate::error::CliError;

pub async fn run_archive(id: &str, archived: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    let mut note = resolve_note(id, &workspace.repo).await?;

    if note.is_archived != archived {
        note.is_archived = archived;
        note = workspace.repo.upsert(note).await?;
    }

    println!("{}", note.id);
    Ok(())
}
