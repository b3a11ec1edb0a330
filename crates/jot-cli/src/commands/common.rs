use std::io::{self, IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use jot_core::config::{remote_session_from_env, SyncSettings};
use jot_core::db::Database;
use jot_core::remote::{ApiSession, HttpNoteApi, OfflineNoteApi};
use jot_core::util::normalize_text_option;
use jot_core::{Note, NoteRepository, SyncStatus};
use serde::Serialize;

use crate::error::CliError;
use crate::remote::CliRemote;

/// An open repository plus whether a remote endpoint is configured
pub struct Workspace {
    pub repo: NoteRepository<CliRemote>,
    pub sync_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct NoteListItem {
    pub id: String,
    pub server_id: Option<String>,
    pub note_type: String,
    pub preview: String,
    pub content: String,
    pub is_archived: bool,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
    pub sync_status: String,
}

pub async fn open_workspace(db_path: &Path) -> Result<Workspace, CliError> {
    let db = Database::open(db_path).await?;
    let settings = SyncSettings::from_env();

    let (api, session, sync_enabled) = match remote_session_from_env()? {
        Some(session) => {
            tracing::debug!("Remote sync enabled: {}", session.base_url);
            (CliRemote::Http(HttpNoteApi::new()?), session, true)
        }
        None => (
            CliRemote::Offline(OfflineNoteApi),
            ApiSession::new("", ""),
            false,
        ),
    };

    let repo = NoteRepository::open(db, Arc::new(api), session, settings).await?;
    if !sync_enabled {
        repo.set_device_connected(false);
    }
    Ok(Workspace { repo, sync_enabled })
}

pub async fn resolve_note(
    note_query: &str,
    repo: &NoteRepository<CliRemote>,
) -> Result<Note, CliError> {
    let note_query = normalize_note_identifier(note_query)?;
    let id = match repo.resolve_id_prefix(&note_query).await {
        Ok(id) => id,
        Err(jot_core::Error::NotFound(_)) => return Err(CliError::NoteNotFound(note_query)),
        Err(jot_core::Error::InvalidInput(message)) => {
            return Err(CliError::AmbiguousNoteId(message))
        }
        Err(error) => return Err(error.into()),
    };

    match repo.get(&id).await {
        Ok(note) => Ok(note),
        Err(jot_core::Error::NotFound(_)) => Err(CliError::NoteNotFound(note_query)),
        Err(error) => Err(error.into()),
    }
}

pub fn print_notes(notes: &[Note], as_json: bool) -> Result<(), CliError> {
    if as_json {
        let json_items = notes
            .iter()
            .map(note_to_list_item)
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_note_lines(notes) {
            println!("{line}");
        }
    }
    Ok(())
}

/// Width of the content column in list output
const PREVIEW_WIDTH: usize = 48;
/// Preview length carried in `--json` output
const JSON_PREVIEW_WIDTH: usize = 96;
/// Characters of the note id shown in list output; `resolve` accepts any unique prefix
const SHORT_ID_LEN: usize = 13;

pub fn format_note_lines(notes: &[Note]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    notes
        .iter()
        .map(|note| {
            format!(
                "{id:<id_width$} {marker} {preview:<preview_width$}  {age}",
                id = short_id(note),
                id_width = SHORT_ID_LEN,
                preview_width = PREVIEW_WIDTH,
                marker = sync_marker(note.sync_status),
                preview = note_preview(note, PREVIEW_WIDTH),
                age = format_relative_time(note.local_updated_at, now_ms),
            )
        })
        .collect()
}

pub fn note_to_list_item(note: &Note) -> NoteListItem {
    let now_ms = Utc::now().timestamp_millis();
    NoteListItem {
        id: note.id.to_string(),
        server_id: note.server_id.clone(),
        note_type: note.note_type.to_string(),
        preview: note_preview(note, JSON_PREVIEW_WIDTH),
        content: note.content.clone(),
        is_archived: note.is_archived,
        created_at: note.created_at.clone(),
        updated_at: note.updated_at.clone(),
        relative_time: format_relative_time(note.local_updated_at, now_ms),
        sync_status: note.sync_status.to_string(),
    }
}

pub fn short_id(note: &Note) -> String {
    note.id.as_str().chars().take(SHORT_ID_LEN).collect()
}

/// One-character sync badge for list output
pub fn sync_marker(status: SyncStatus) -> char {
    match status {
        SyncStatus::Conflict => '!',
        status if status.is_pending() => '*',
        _ => ' ',
    }
}

/// First line of a note with runs of whitespace folded, cut to `width` characters
pub fn note_preview(note: &Note, width: usize) -> String {
    let words = note
        .title_preview(usize::MAX)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if words.chars().count() <= width {
        return words;
    }
    let mut cut: String = words.chars().take(width.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push('\u{2026}');
    cut
}

/// Age of a local write: minutes and hours while recent, then days, then the date
pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    const MINUTE: i64 = 60_000;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;

    match now_ms.saturating_sub(timestamp_ms) {
        age if age < MINUTE => "now".to_string(),
        age if age < HOUR => format!("{} min ago", age / MINUTE),
        age if age < DAY => format!("{} h ago", age / HOUR),
        age if age < 2 * DAY => "yesterday".to_string(),
        age if age < 7 * DAY => format!("{} days ago", age / DAY),
        _ => DateTime::from_timestamp_millis(timestamp_ms)
            .map_or_else(String::new, |at| at.format("%Y-%m-%d").to_string()),
    }
}

/// Content from the arguments, else from piped stdin
pub fn resolve_note_content(content_parts: &[String]) -> Result<String, CliError> {
    normalize_content(&content_parts.join(" "))
        .map_or_else(read_piped_stdin, |content| Ok(Some(content)))?
        .ok_or(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    normalize_text_option(Some(content.to_string()))
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    normalize_content(query).ok_or(CliError::EmptySearchQuery)
}

pub fn normalize_note_identifier(id: &str) -> Result<String, CliError> {
    normalize_content(id).ok_or(CliError::EmptyNoteId)
}

/// Piped input only; an interactive terminal is never read
fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let mut stdin = io::stdin().lock();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut piped = String::new();
    stdin.read_to_string(&mut piped)?;
    Ok(normalize_content(&piped))
}
