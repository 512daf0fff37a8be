use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use log::{debug, error, trace, warn};
use tempfile::NamedTempFile;

use super::LocalStorage;
use crate::{FlashError, Result};

/// Local string store kept as a single JSON object file.
pub struct FileLocalStorage {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    lock: Mutex<()>,
}

impl FileLocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_items(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| {
            error!("Failed to open local storage {}: {}", self.path.display(), e);
            FlashError::read(e)
        })?;
        serde_json::from_str(&raw).map_err(FlashError::read)
    }
}

impl LocalStorage for FileLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let mut items = self.read_items()?;
        Ok(items.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().map_err(FlashError::write)?;

        // An unreadable file is replaced rather than blocking every later write
        let mut items = self.read_items().unwrap_or_else(|e| {
            warn!("Discarding unreadable {}: {}", self.path.display(), e);
            BTreeMap::new()
        });
        items.insert(key.to_string(), value.to_string());

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        if !dir.exists() {
            debug!("Creating local storage directory: {}", dir.display());
            fs::create_dir_all(dir).map_err(FlashError::write)?;
        }

        // Create the temp file beside the target so persist() is an atomic rename
        let mut temp_file = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            FlashError::write(e)
        })?;

        trace!("Writing {} items to temporary file", items.len());
        let json = serde_json::to_string_pretty(&items).map_err(FlashError::write)?;
        temp_file
            .write_all(json.as_bytes())
            .and_then(|_| temp_file.flush())
            .map_err(|e| {
                error!("Failed to write temporary file: {}", e);
                FlashError::write(e)
            })?;

        temp_file.persist(&self.path).map_err(|e| {
            error!("Failed to persist {}: {}", self.path.display(), e.error);
            FlashError::write(e.error)
        })?;

        debug!("Stored '{}' in {}", key, self.path.display());
        Ok(())
    }
}

/// In-memory local store; writes can be made to fail for tests
#[derive(Default)]
pub struct MemoryLocalStorage {
    items: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.lock().map_err(FlashError::read)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(FlashError::StorageWrite {
                message: "The quota has been exceeded.".to_string(),
            });
        }
        let mut items = self.items.lock().map_err(FlashError::write)?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
