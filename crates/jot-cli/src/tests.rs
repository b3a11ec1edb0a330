use std::path::PathBuf;

use clap::Parser;
use jot_core::{Note, NoteType, SyncStatus};

use crate::cli::{Cli, Commands, KeepSide, NoteTypeArg};
use crate::commands::common::{
    format_note_lines, format_relative_time, normalize_content, normalize_note_identifier,
    normalize_search_query, note_preview, note_to_list_item, sync_marker,
};
use crate::commands::status::{format_status_lines, StatusReport};
use crate::error::CliError;
use crate::resolve_db_path;

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn empty_identifiers_and_queries_are_rejected() {
    assert!(matches!(
        normalize_note_identifier("   "),
        Err(CliError::EmptyNoteId)
    ));
    assert!(matches!(
        normalize_search_query(""),
        Err(CliError::EmptySearchQuery)
    ));
    assert_eq!(normalize_search_query(" milk ").unwrap(), "milk");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    let day = 24 * 60 * 60_000;
    assert_eq!(format_relative_time(now - 30_000, now), "now");
    assert_eq!(format_relative_time(now - 120_000, now), "2 min ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2 h ago");
    assert_eq!(format_relative_time(now - day - 1, now), "yesterday");
    assert_eq!(format_relative_time(now - 3 * day, now), "3 days ago");
    // 1970-04-26 17:46:40 UTC, 10 days earlier
    assert_eq!(format_relative_time(now - 10 * day, now), "1970-04-16");
}

#[test]
fn note_preview_collapses_and_truncates() {
    let note = Note::new("  lots   of\tspace here  \nsecond line", NoteType::Note);
    assert_eq!(note_preview(&note, 40), "lots of space here");
    assert_eq!(note_preview(&note, 9), "lots of\u{2026}");
}

#[test]
fn list_lines_show_short_id_and_pending_marker() {
    let note = Note::new("buy milk", NoteType::Todo);
    let lines = format_note_lines(std::slice::from_ref(&note));

    assert_eq!(lines.len(), 1);
    let short_id = note.id.to_string().chars().take(13).collect::<String>();
    assert!(lines[0].starts_with(&short_id));
    assert!(lines[0].contains("* buy milk"));
}

#[test]
fn sync_markers_distinguish_states() {
    assert_eq!(sync_marker(SyncStatus::Synced), ' ');
    assert_eq!(sync_marker(SyncStatus::PendingDelete), '*');
    assert_eq!(sync_marker(SyncStatus::Conflict), '!');
}

#[test]
fn list_item_carries_sync_metadata() {
    let note = Note::new("idea", NoteType::Idea);
    let item = note_to_list_item(&note);

    assert_eq!(item.note_type, "idea");
    assert_eq!(item.sync_status, "PENDING_CREATE");
    assert_eq!(item.server_id, None);
    assert!(!item.is_archived);
}

#[test]
fn status_lines_report_local_only_mode() {
    let report = StatusReport {
        db_path: "/tmp/jot.db".to_string(),
        sync_enabled: false,
        pending_changes: 2,
        conflicts: 1,
        state: "offline".to_string(),
    };
    let lines = format_status_lines(&report);

    assert!(lines.contains(&"Remote:    local only".to_string()));
    assert!(lines.contains(&"Pending:   2".to_string()));
}

#[test]
fn explicit_db_path_wins() {
    let path = PathBuf::from("/tmp/custom.db");
    assert_eq!(resolve_db_path(Some(path.clone())), path);
}

#[test]
fn parses_add_with_type() {
    let cli = Cli::try_parse_from(["jot", "add", "--type", "todo", "buy", "milk"]).unwrap();
    match cli.command {
        Commands::Add { content, note_type } => {
            assert_eq!(content, vec!["buy".to_string(), "milk".to_string()]);
            assert_eq!(NoteType::from(note_type), NoteType::Todo);
        }
        _ => panic!("expected add"),
    }
}

#[test]
fn parses_resolve_and_global_db_path() {
    let cli = Cli::try_parse_from([
        "jot",
        "resolve",
        "0192abcd",
        "--keep",
        "remote",
        "--db-path",
        "/tmp/jot.db",
    ])
    .unwrap();

    assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/jot.db")));
    match cli.command {
        Commands::Resolve { id, keep } => {
            assert_eq!(id, "0192abcd");
            assert_eq!(keep, KeepSide::Remote);
        }
        _ => panic!("expected resolve"),
    }
}

#[test]
fn resolve_requires_a_side() {
    assert!(Cli::try_parse_from(["jot", "resolve", "0192abcd"]).is_err());
}

#[test]
fn note_type_args_map_to_core_types() {
    assert_eq!(NoteType::from(NoteTypeArg::Journal), NoteType::Journal);
    assert_eq!(NoteType::from(NoteTypeArg::Note), NoteType::Note);
}
