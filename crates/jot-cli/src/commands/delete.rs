use std::path::Path;

use crate::commands::common::{open_workspace, resolve_note};
use crate::error::CliError;

pub async fn run_delete(id: &str, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    let note = resolve_note(id, &workspace.repo).await?;

    workspace.repo.delete(&note.id).await?;
    println!("{}", note.id);
    Ok(())
}
