//! Jot CLI - offline-first notes from the command line
//!
//! Every command works without a network; when `JOT_API_URL` and
//! `JOT_API_TOKEN` are set, changes are pushed to the note service.

mod cli;
mod commands;
mod error;
mod remote;

#[cfg(test)]
mod tests;

use std::env;
use std::path::PathBuf;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::archive::run_archive;
use crate::commands::conflicts::run_conflicts;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::list::run_list;
use crate::commands::resolve::run_resolve;
use crate::commands::search::run_search;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let default_filter: tracing_subscriber::filter::Directive = "jot=info"
        .parse()
        .map_err(|error| CliError::Config(format!("invalid log filter: {error}")))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_filter),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add { content, note_type } => run_add(&content, note_type.into(), &db_path).await,
        Commands::List {
            note_type,
            archived,
            limit,
            json,
        } => run_list(note_type.into(), archived, limit, json, &db_path).await,
        Commands::Search { query, limit, json } => run_search(&query, limit, json, &db_path).await,
        Commands::Edit { id, content } => run_edit(&id, &content, &db_path).await,
        Commands::Archive { id, undo } => run_archive(&id, !undo, &db_path).await,
        Commands::Delete { id } => run_delete(&id, &db_path).await,
        Commands::Sync { watch } => run_sync(watch, &db_path).await,
        Commands::Status { json } => run_status(json, &db_path).await,
        Commands::Conflicts { json } => run_conflicts(json, &db_path).await,
        Commands::Resolve { id, keep } => run_resolve(&id, keep, &db_path).await,
    }
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("JOT_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("jot")
        .join("jot.db")
}
