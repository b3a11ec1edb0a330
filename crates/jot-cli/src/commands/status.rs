use std::path::Path;

use serde::Serialize;

use crate::commands::common::open_workspace;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub sync_enabled: bool,
    pub pending_changes: usize,
    pub conflicts: usize,
    pub state: String,
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let workspace = open_workspace(db_path).await?;
    let repo = &workspace.repo;

    let report = StatusReport {
        db_path: db_path.display().to_string(),
        sync_enabled: workspace.sync_enabled,
        pending_changes: *repo.pending_sync_count().borrow(),
        conflicts: repo.conflicts().borrow().len(),
        state: repo.sync_state().borrow().as_str().to_string(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for line in format_status_lines(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(report: &StatusReport) -> Vec<String> {
    let remote = if report.sync_enabled {
        "configured"
    } else {
        "local only"
    };
    vec![
        format!("Database:  {}", report.db_path),
        format!("Remote:    {remote}"),
        format!("Pending:   {}", report.pending_changes),
        format!("Conflicts: {}", report.conflicts),
        format!("State:     {}", report.state),
    ]
}
