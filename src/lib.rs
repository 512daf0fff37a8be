//! Flash Notes library
//!
//! This library provides the note-state core of a quick-notes popup: an
//! in-memory note store with soft delete, a persistence adapter over two
//! key-value storage areas, an expiry sweeper for the recycle bin and a
//! badge notifier for the incomplete-notes count.

mod badge;
mod cli;
mod config;
mod errors;
mod helper;
mod note;
mod persistence;
mod store;
mod sweeper;
mod types;

// Re-export key components
pub use badge::*;
pub use cli::*;
pub use config::*;
pub use errors::*;
pub use helper::*;
pub use note::*;
pub use persistence::*;
pub use store::*;
pub use sweeper::*;
pub use types::*;
