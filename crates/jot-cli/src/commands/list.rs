use std::path::Path;

use jot_core::NoteType;

use crate::commands::common::{open_workspace, print_notes};
use crate::error::CliError;

pub async fn run_list(
    note_type: NoteType,
    archived: bool,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    let mut notes = workspace.repo.list(note_type, archived).await?;
    notes.truncate(limit);

    print_notes(&notes, as_json)
}
