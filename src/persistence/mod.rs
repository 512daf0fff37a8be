//! Persistence adapter for the note store.
//!
//! Notes live under a single key in one of two key-value areas: an
//! asynchronous extension area holding structured values, or a synchronous
//! local area holding JSON strings. The adapter decides which one to use on
//! every call, so an area that appears or disappears at runtime is picked up
//! without restarting.
mod extension;
mod local;

use std::{fs, sync::Arc};

use async_trait::async_trait;
use log::{debug, trace, warn};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

pub use extension::{FileExtensionStorage, MemoryExtensionStorage};
pub use local::{FileLocalStorage, MemoryLocalStorage};

use crate::{Backend, Config, DeletedNote, FlashError, Note, Result};

/// Key holding the active notes.
pub const NOTES_KEY: &str = "notes";

/// Key holding the recycle bin when history persistence is enabled.
pub const DELETED_NOTES_KEY: &str = "deletedNotes";

/// Asynchronous storage area provided by the extension host.
#[async_trait]
pub trait ExtensionStorage: Send + Sync {
    /// Whether the host currently exposes this area
    fn is_available(&self) -> bool;

    async fn get(&self, key: &str) -> Result<Option<Value>>;

    async fn set(&self, key: &str, value: Value) -> Result<()>;
}

/// Synchronous string key-value store used when the extension area is missing.
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// Selects the extension area when the host exposes one.
pub fn is_extension_available(extension: Option<&dyn ExtensionStorage>) -> bool {
    extension.is_some_and(|area| area.is_available())
}

/// Uniform load/save over the two storage areas
#[derive(Clone)]
pub struct PersistenceAdapter {
    extension: Option<Arc<dyn ExtensionStorage>>,
    local: Arc<dyn LocalStorage>,
}

impl PersistenceAdapter {
    pub fn new(extension: Option<Arc<dyn ExtensionStorage>>, local: Arc<dyn LocalStorage>) -> Self {
        Self { extension, local }
    }

    /// Builds file-backed areas under the configured data directory.
    ///
    /// `Extension` creates the extension area up front; `Auto` only uses it
    /// once its directory exists; `Local` never looks at it.
    pub fn from_config(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir).map_err(|_| FlashError::DirectoryError {
            path: config.data_dir.clone(),
        })?;

        let extension: Option<Arc<dyn ExtensionStorage>> = match config.backend {
            Backend::Local => None,
            Backend::Extension => {
                let dir = config.extension_dir();
                fs::create_dir_all(&dir).map_err(|_| FlashError::DirectoryError { path: dir })?;
                Some(Arc::new(FileExtensionStorage::new(config.extension_dir())))
            }
            Backend::Auto => Some(Arc::new(FileExtensionStorage::new(config.extension_dir()))),
        };
        debug!(
            "Storage under {} (backend {:?})",
            config.data_dir.display(),
            config.backend
        );

        Ok(Self::new(
            extension,
            Arc::new(FileLocalStorage::new(config.local_storage_path())),
        ))
    }

    /// Adapter over the local area only
    pub fn local_only(local: Arc<dyn LocalStorage>) -> Self {
        Self {
            extension: None,
            local,
        }
    }

    fn active_extension(&self) -> Option<&dyn ExtensionStorage> {
        let extension = self.extension.as_deref();
        if is_extension_available(extension) {
            extension
        } else {
            None
        }
    }

    /// Reads the records stored under `key`.
    ///
    /// A missing key is an empty list. Individual records that fail to parse
    /// are skipped with a warning; a value that is not a list at all, or a
    /// backend that cannot be read, is reported as `StorageRead`.
    pub async fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        let raw = match self.active_extension() {
            Some(area) => {
                trace!("Reading '{}' from extension storage", key);
                area.get(key).await?
            }
            None => {
                trace!("Reading '{}' from local storage", key);
                match self.local.get_item(key)? {
                    Some(text) => Some(serde_json::from_str(&text).map_err(FlashError::read)?),
                    None => None,
                }
            }
        };

        let entries = match raw {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(other) => {
                return Err(FlashError::StorageRead {
                    message: format!("expected a list under '{}', found {}", key, kind(&other)),
                })
            }
        };

        let total = entries.len();
        let mut records = Vec::with_capacity(total);
        let mut skipped = 0;
        for entry in entries {
            match serde_json::from_value(entry) {
                Ok(record) => records.push(record),
                Err(e) => {
                    skipped += 1;
                    warn!("Skipping malformed record under '{}': {}", key, e);
                }
            }
        }

        if skipped > 0 {
            warn!("Loaded {} of {} records under '{}'", records.len(), total, key);
        } else {
            debug!("Loaded {} records under '{}'", records.len(), key);
        }
        Ok(records)
    }

    /// Like [`try_load`](Self::try_load) but never fails: errors yield an empty list.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        self.try_load(key).await.unwrap_or_else(|e| {
            warn!("{}; starting with an empty list", e);
            Vec::new()
        })
    }

    /// Replaces the records stored under `key`.
    pub async fn save<T: Serialize + Sync>(&self, key: &str, records: &[T]) -> Result<()> {
        let value = serde_json::to_value(records).map_err(FlashError::write)?;

        match self.active_extension() {
            Some(area) => {
                trace!("Writing {} records to extension storage", records.len());
                area.set(key, value).await.map_err(into_write_error)
            }
            None => {
                trace!("Writing {} records to local storage", records.len());
                let text = serde_json::to_string(&value).map_err(FlashError::write)?;
                self.local.set_item(key, &text).map_err(into_write_error)
            }
        }
    }

    pub async fn load_notes(&self) -> Vec<Note> {
        self.load(NOTES_KEY).await
    }

    pub async fn save_notes(&self, notes: &[Note]) -> Result<()> {
        self.save(NOTES_KEY, notes).await
    }

    pub async fn save_deleted_notes(&self, deleted: &[DeletedNote]) -> Result<()> {
        self.save(DELETED_NOTES_KEY, deleted).await
    }
}

fn into_write_error(err: FlashError) -> FlashError {
    match err {
        FlashError::StorageWrite { .. } => err,
        other => FlashError::write(other),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
