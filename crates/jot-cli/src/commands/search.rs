use std::path::Path;

use crate::commands::common::{normalize_search_query, open_workspace, print_notes};
use crate::error::CliError;

pub async fn run_search(
    query: &str,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let workspace = open_workspace(db_path).await?;
    let mut notes = workspace.repo.search(&normalized_query).await?;
    notes.truncate(limit);

    print_notes(&notes, as_json)
}
