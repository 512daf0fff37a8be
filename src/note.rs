//! Core data structures for the flash-notes application.
//!
//! This module contains the note records held by the store, the id source
//! used to stamp new notes, and the ordering rules used to display them.
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last id handed out by [`next_note_id`] in this process.
static LAST_NOTE_ID: AtomicI64 = AtomicI64::new(0);

/// Returns a fresh note id derived from the current time in milliseconds.
///
/// Ids are strictly increasing within a process run: when two notes are
/// created in the same millisecond the second one gets the next integer.
pub fn next_note_id(now: DateTime<Utc>) -> i64 {
    let candidate = now.timestamp_millis();
    let previous = LAST_NOTE_ID
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(candidate.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    candidate.max(previous + 1)
}

/// Keeps [`next_note_id`] above ids that already exist, e.g. ones loaded from storage.
pub fn reserve_note_ids(highest: i64) {
    LAST_NOTE_ID.fetch_max(highest, Ordering::SeqCst);
}

/// Represents a single active note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NoteRecord")]
pub struct Note {
    /// Unique identifier for the note
    pub id: i64,
    /// Note content; rich-text markup is kept as-is
    pub content: String,
    /// Whether the note has been ticked off
    pub completed: bool,
    /// Priority flag, independent of `completed`
    pub priority: bool,
    /// Pinned notes are displayed before unpinned ones
    pub pinned: bool,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last content modification time
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note with the given content, stamped at `now`
    pub fn new(content: String, now: DateTime<Utc>) -> Self {
        Note {
            id: next_note_id(now),
            content,
            completed: false,
            priority: false,
            pinned: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Snapshots this note into the recycle bin
    pub fn into_deleted(self, deleted_at: DateTime<Utc>) -> DeletedNote {
        DeletedNote {
            note: self,
            deleted_at,
        }
    }
}

/// On-disk shape of a note. Older records lack the flags and `updatedAt`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteRecord {
    id: i64,
    #[serde(default)]
    content: String,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    priority: bool,
    #[serde(default)]
    pinned: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<NoteRecord> for Note {
    fn from(record: NoteRecord) -> Self {
        Note {
            id: record.id,
            content: record.content,
            completed: record.completed,
            priority: record.priority,
            pinned: record.pinned,
            created_at: record.created_at,
            updated_at: record.updated_at.unwrap_or(record.created_at),
        }
    }
}

/// A note that sits in the recycle bin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedNote {
    #[serde(flatten)]
    pub note: Note,
    /// When the note was moved out of the active list
    pub deleted_at: DateTime<Utc>,
}

impl DeletedNote {
    pub fn id(&self) -> i64 {
        self.note.id
    }

    /// Turns the snapshot back into an active note with a fresh `updated_at`
    pub fn restore(self, now: DateTime<Utc>) -> Note {
        Note {
            updated_at: now,
            ..self.note
        }
    }
}

/// Orders notes for display: pinned notes first, list order otherwise.
pub fn display_order(notes: &[Note]) -> Vec<&Note> {
    let mut ordered: Vec<&Note> = notes.iter().collect();
    // sort_by_key is stable, so list order survives inside each group
    ordered.sort_by_key(|note| !note.pinned);
    ordered
}

/// Number of notes that are not completed.
pub fn count_incomplete(notes: &[Note]) -> usize {
    notes.iter().filter(|note| !note.completed).count()
}
