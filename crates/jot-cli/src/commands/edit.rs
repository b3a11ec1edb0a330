use std::path::Path;

use crate::commands::common::{open_workspace, resolve_note, resolve_note_content};
use crate::error::CliError;

pub async fn run_edit(id: &str, content_parts: &[String], db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    let mut note = resolve_note(id, &workspace.repo).await?;
    let content = resolve_note_content(content_parts)?;

    if content == note.content {
        println!("{}", note.id);
        return Ok(());
    }

    note.content = content;
    let updated = workspace.repo.upsert(note).await?;
    println!("{}", updated.id);
    Ok(())
}
