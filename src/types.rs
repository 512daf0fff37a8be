//! Shared types for the flash-notes application.
//!
//! This module contains the result alias, the read model handed to the
//! presentation layer and the command-line subcommands.
use clap::Subcommand;
use serde::Serialize;

use crate::{DeletedNote, FlashError, Note};

/// A specialized Result type for flash-notes operations.
pub type Result<T> = std::result::Result<T, FlashError>;

/// Everything the presentation layer reads from the store at once
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    /// Active notes in list order
    pub notes: Vec<Note>,
    /// Notes in the recycle bin
    pub deleted_notes: Vec<DeletedNote>,
    /// Number of active notes not yet completed
    pub incomplete_notes: usize,
    /// Last error message, if any
    pub error: Option<String>,
}

/// Available subcommands for the flash-notes application
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Add a new note
    Add {
        /// Content of the note, markup is stored as-is
        content: String,
    },

    /// List active notes, pinned first
    List {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,

        /// Print full content instead of a one-line preview
        #[clap(short, long)]
        all: bool,
    },

    /// Search notes by content
    Search {
        /// Search query text
        query: String,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Replace the content of a note
    Edit {
        /// ID of the note to edit
        id: i64,

        /// New content for the note
        content: String,
    },

    /// Toggle the completed flag of a note
    Done {
        /// ID of the note
        id: i64,
    },

    /// Toggle the priority flag of a note
    Priority {
        /// ID of the note
        id: i64,
    },

    /// Toggle the pinned flag of a note
    Pin {
        /// ID of the note
        id: i64,
    },

    /// Move a note to the history tab
    Delete {
        /// ID of the note to delete
        id: i64,
    },

    /// Move the note at one list position to another
    Move {
        /// Current position (0-based)
        from: usize,

        /// Target position (0-based)
        to: usize,
    },

    /// Delete every active note
    Clear {
        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Show deleted notes with their remaining retention time
    History {
        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Restore a deleted note
    Restore {
        /// ID of the deleted note
        id: i64,
    },

    /// Permanently delete a note from history
    Purge {
        /// ID of the deleted note
        id: i64,
    },

    /// Empty the history tab
    ClearHistory,

    /// Show the incomplete-notes badge
    Badge,
}
