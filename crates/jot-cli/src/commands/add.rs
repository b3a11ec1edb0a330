use std::path::Path;

use jot_core::{Note, NoteType};

use crate::commands::common::{open_workspace, resolve_note_content};
use crate::error::CliError;

pub async fn run_add(
    content_parts: &[String],
    note_type: NoteType,
    db_path: &Path,
) -> Result<(), CliError> {
    let content = resolve_note_content(content_parts)?;

    let workspace = open_workspace(db_path).await?;
    let note = workspace.repo.upsert(Note::new(content, note_type)).await?;

    println!("{}", note.id);
    Ok(())
}
