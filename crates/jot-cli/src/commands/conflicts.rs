use std::path::Path;

use crate::commands::common::{open_workspace, print_notes};
use crate::error::CliError;

pub async fn run_conflicts(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    let conflicts = workspace.repo.conflicts().borrow().clone();

    if conflicts.is_empty() && !as_json {
        println!("No sync conflicts.");
        return Ok(());
    }

    print_notes(&conflicts, as_json)
}
