use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use jot_core::NoteType;

#[derive(Parser)]
#[command(name = "jot")]
#[command(about = "Offline-first notes from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new note
    #[command(alias = "new")]
    Add {
        /// Note content (read from stdin when omitted)
        content: Vec<String>,
        /// Kind of note
        #[arg(short = 't', long = "type", value_enum, default_value_t = NoteTypeArg::Note)]
        note_type: NoteTypeArg,
    },
    /// List notes of one type
    #[command(alias = "ls")]
    List {
        /// Kind of note to list
        #[arg(short = 't', long = "type", value_enum, default_value_t = NoteTypeArg::Note)]
        note_type: NoteTypeArg,
        /// Show archived notes instead
        #[arg(long)]
        archived: bool,
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search note content
    Search {
        /// Search term
        query: String,
        /// Number of notes to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replace the content of a note
    Edit {
        /// Note ID or unique ID prefix
        id: String,
        /// New content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// Archive a note
    Archive {
        /// Note ID or unique ID prefix
        id: String,
        /// Move the note back out of the archive
        #[arg(long)]
        undo: bool,
    },
    /// Delete a note
    #[command(alias = "rm")]
    Delete {
        /// Note ID or unique ID prefix
        id: String,
    },
    /// Push pending changes to the note service
    Sync {
        /// Keep running and sync in the background until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Show pending changes, conflicts and sync state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List notes in conflict with the server
    Conflicts {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Settle a conflict by keeping one version
    Resolve {
        /// Note ID or unique ID prefix
        id: String,
        /// Version to keep
        #[arg(long, value_enum)]
        keep: KeepSide,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum NoteTypeArg {
    Note,
    Todo,
    Idea,
    Journal,
}

impl From<NoteTypeArg> for NoteType {
    fn from(value: NoteTypeArg) -> Self {
        match value {
            NoteTypeArg::Note => Self::Note,
            NoteTypeArg::Todo => Self::Todo,
            NoteTypeArg::Idea => Self::Idea,
            NoteTypeArg::Journal => Self::Journal,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum KeepSide {
    Local,
    Remote,
}
