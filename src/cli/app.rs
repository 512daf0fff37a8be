//! CLI module for the flash-notes application
//!
//! This module plays the presentation layer: it turns subcommands into note
//! store operations and renders the resulting state in the terminal.
use std::{
    io::{stdin, stdout, Write},
    sync::Arc,
};

use chrono::{Local, Utc};
use console::style;
use log::{debug, info};

use crate::{
    format_relative_date, preview, time_until_expiry, Commands, DeletedNote, FlashError, Note,
    NoteStore, Result, TerminalBadge,
};

/// CLI Application handler - processes CLI commands and interfaces with NoteStore
pub struct App {
    /// The note store backend
    store: NoteStore,

    /// Badge rendered after each command
    badge: Arc<TerminalBadge>,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    /// Create a new CLI application around an opened store
    pub fn new(store: NoteStore, badge: Arc<TerminalBadge>, verbose: bool) -> Self {
        Self {
            store,
            badge,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        debug!("Running command: {:?}", command);
        match command {
            Commands::Add { content } => self.handle_add(&content)?,

            Commands::List { json, all } => self.handle_list(json, all)?,

            Commands::Search { query, json } => self.handle_search(&query, json)?,

            Commands::Edit { id, content } => {
                self.require_note(id)?;
                if self.store.edit_note(id, &content).is_none() {
                    return Err(FlashError::InvalidInput {
                        message: "note content cannot be empty".to_string(),
                    });
                }
                println!("Note {} updated", id);
            }

            Commands::Done { id } => {
                let note = self.store.toggle_completion(id).ok_or(FlashError::NoteNotFound { id })?;
                let state = if note.completed { "completed" } else { "reopened" };
                println!("Note {} {}", id, state);
            }

            Commands::Priority { id } => {
                let note = self.store.toggle_priority(id).ok_or(FlashError::NoteNotFound { id })?;
                let state = if note.priority { "marked as priority" } else { "no longer priority" };
                println!("Note {} {}", id, state);
            }

            Commands::Pin { id } => {
                let note = self.store.toggle_pin(id).ok_or(FlashError::NoteNotFound { id })?;
                let state = if note.pinned { "pinned" } else { "unpinned" };
                println!("Note {} {}", id, state);
            }

            Commands::Delete { id } => {
                self.store.delete_note(id).ok_or(FlashError::NoteNotFound { id })?;
                println!(
                    "Note {} moved to history for {} minutes",
                    id,
                    self.store.options().retention.num_minutes()
                );
            }

            Commands::Move { from, to } => {
                if !self.store.reorder_notes(from, to) {
                    return Err(FlashError::InvalidInput {
                        message: format!(
                            "cannot move {} to {} in a list of {} notes",
                            from,
                            to,
                            self.store.notes().len()
                        ),
                    });
                }
                println!("Moved note from position {} to {}", from, to);
            }

            Commands::Clear { force } => self.handle_clear(force)?,

            Commands::History { json } => self.handle_history(json)?,

            Commands::Restore { id } => {
                let note = self
                    .store
                    .restore_note_by_id(id)
                    .ok_or(FlashError::NoteNotFound { id })?;
                println!("Restored note {}: {}", note.id, preview(&note.content, 60));
            }

            Commands::Purge { id } => {
                if !self.store.delete_deleted_note(id) {
                    return Err(FlashError::NoteNotFound { id });
                }
                println!("Note {} permanently deleted", id);
            }

            Commands::ClearHistory => {
                self.store.clear_all_history();
                println!("History cleared");
            }

            Commands::Badge => {}
        }

        // Write outcomes only reach the error slot once the queue drains
        self.store.flush().await;
        self.render_status();
        Ok(())
    }

    fn require_note(&self, id: i64) -> Result<Note> {
        self.store.get_note(id).ok_or(FlashError::NoteNotFound { id })
    }

    fn handle_add(&self, content: &str) -> Result<()> {
        let note = self
            .store
            .add_note(content)
            .ok_or_else(|| FlashError::InvalidInput {
                message: "note content cannot be empty".to_string(),
            })?;
        info!("Created note {}", note.id);
        println!("Note created with ID: {}", note.id);
        Ok(())
    }

    fn handle_list(&self, json: bool, all: bool) -> Result<()> {
        let notes = self.store.display_notes();
        if json {
            println!("{}", serde_json::to_string_pretty(&notes)?);
            return Ok(());
        }
        self.display_notes_text(&notes, all);
        Ok(())
    }

    fn handle_search(&self, query: &str, json: bool) -> Result<()> {
        let notes = self.store.search(query);
        if json {
            println!("{}", serde_json::to_string_pretty(&notes)?);
            return Ok(());
        }
        self.display_notes_text(&notes, false);
        Ok(())
    }

    fn handle_clear(&self, force: bool) -> Result<()> {
        let count = self.store.notes().len();
        if count == 0 {
            println!("There are no notes to clear.");
            return Ok(());
        }

        if !force {
            print!(
                "Delete all {} note{}? They will not go to history. [y/N]: ",
                count,
                if count == 1 { "" } else { "s" }
            );
            stdout().flush().map_err(FlashError::Io)?;

            let mut input = String::new();
            stdin().read_line(&mut input).map_err(FlashError::Io)?;
            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Clear cancelled.");
                return Ok(());
            }
        }

        self.store.clear_all_notes();
        println!("All notes cleared");
        Ok(())
    }

    fn handle_history(&self, json: bool) -> Result<()> {
        let deleted = self.store.deleted_notes();
        if json {
            println!("{}", serde_json::to_string_pretty(&deleted)?);
            return Ok(());
        }
        if deleted.is_empty() {
            println!("No deleted notes");
            return Ok(());
        }
        for note in &deleted {
            self.display_deleted_note(note);
        }
        Ok(())
    }

    /// Display notes as one block per note
    fn display_notes_text(&self, notes: &[Note], detailed: bool) {
        if notes.is_empty() {
            println!("No notes found.");
            return;
        }

        // Use terminal width for formatting if available
        let term_width = terminal_size::terminal_size()
            .map(|(w, _)| w.0 as usize)
            .unwrap_or(80);
        let now = Local::now();

        for note in notes {
            let mut markers = String::new();
            if note.pinned {
                markers.push_str(&style("[pinned] ").cyan().to_string());
            }
            if note.completed {
                markers.push_str(&style("[done] ").green().to_string());
            }
            if note.priority {
                markers.push_str(&style("[!] ").yellow().bold().to_string());
            }

            let body = if detailed {
                note.content.clone()
            } else {
                preview(&note.content, term_width.saturating_sub(4).max(20))
            };
            let body = if note.completed {
                style(body).dim().to_string()
            } else {
                body
            };

            println!("{}{}", markers, body);
            let mut meta = format!(
                "  #{} · {}",
                note.id,
                format_relative_date(note.created_at, &now)
            );
            if self.verbose && note.updated_at != note.created_at {
                meta.push_str(&format!(
                    " · edited {}",
                    format_relative_date(note.updated_at, &now)
                ));
            }
            println!("{}", style(meta).dim());
        }
    }

    fn display_deleted_note(&self, note: &DeletedNote) {
        let now = Utc::now();
        let left = time_until_expiry(note.deleted_at, now, self.store.options().retention);
        println!("{}", preview(&note.note.content, 60));
        println!(
            "{}",
            style(format!(
                "  #{} · Deleted: {} · expires in {} min",
                note.id(),
                format_relative_date(note.deleted_at, &Local::now()),
                left.num_minutes()
            ))
            .dim()
        );
    }

    /// Prints the incomplete counter, the badge and the latest error
    fn render_status(&self) {
        let incomplete = self.store.incomplete_notes();
        match self.badge.render() {
            Some(badge) => println!("\nIncomplete: {} {}", incomplete, badge),
            None => println!("\nIncomplete: {}", incomplete),
        }
        if let Some(error) = self.store.error() {
            eprintln!("{}", style(error).red());
        }
    }
}
