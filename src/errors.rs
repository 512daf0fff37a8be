//! Error types for the flash-notes application.
//!
//! This module defines custom error types that categorize the failures
//! that can occur while managing and persisting notes.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the flash-notes application.
#[derive(Error, Debug)]
pub enum FlashError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Persisted data is malformed or the backend could not be read.
    #[error("Error loading notes: {message}")]
    StorageRead { message: String },

    /// The storage backend rejected a write.
    #[error("Error saving notes: {message}")]
    StorageWrite { message: String },

    /// Input rejected before reaching the store (e.g. empty note content).
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: i64 },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// The expiry sweeper could not be started or stopped.
    #[error("Sweeper error: {message}")]
    SchedulerError { message: String },
}

impl FlashError {
    /// Wraps any backend failure as a write error, keeping its message.
    pub fn write(err: impl std::fmt::Display) -> Self {
        FlashError::StorageWrite {
            message: err.to_string(),
        }
    }

    /// Wraps any backend failure as a read error, keeping its message.
    pub fn read(err: impl std::fmt::Display) -> Self {
        FlashError::StorageRead {
            message: err.to_string(),
        }
    }
}
