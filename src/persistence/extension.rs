use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use async_trait::async_trait;
use log::{debug, error, trace, warn};
use serde_json::{Map, Value};
use tokio::{fs, sync::Mutex as TokioMutex};

use super::ExtensionStorage;
use crate::{FlashError, Result};

const AREA_FILE: &str = "storage.json";

/// Extension storage area kept as one JSON object inside a directory.
///
/// The area counts as available only while its directory exists.
pub struct FileExtensionStorage {
    dir: PathBuf,
    /// Serializes read-modify-write cycles on the area file
    write_lock: TokioMutex<()>,
}

impl FileExtensionStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: TokioMutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn area_path(&self) -> PathBuf {
        self.dir.join(AREA_FILE)
    }

    async fn read_area(&self) -> Result<Map<String, Value>> {
        let path = self.area_path();
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => {
                error!("Failed to read extension area {}: {}", path.display(), e);
                return Err(FlashError::read(e));
            }
        };

        match serde_json::from_str::<Value>(&raw).map_err(FlashError::read)? {
            Value::Object(map) => Ok(map),
            _ => Err(FlashError::StorageRead {
                message: format!("{} does not hold an object", path.display()),
            }),
        }
    }
}

#[async_trait]
impl ExtensionStorage for FileExtensionStorage {
    fn is_available(&self) -> bool {
        self.dir.is_dir()
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let mut area = self.read_area().await?;
        Ok(area.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut area = match self.read_area().await {
            Ok(area) => area,
            Err(e) => {
                warn!("Discarding unreadable extension area: {}", e);
                Map::new()
            }
        };
        area.insert(key.to_string(), value);
        let json = serde_json::to_string(&Value::Object(area)).map_err(FlashError::write)?;

        // Write next to the target and rename so readers never see half a file
        let path = self.area_path();
        let temp_path = self.dir.join(format!("{}.tmp", AREA_FILE));
        trace!("Writing extension area via {}", temp_path.display());
        fs::write(&temp_path, json).await.map_err(|e| {
            error!("Failed to write {}: {}", temp_path.display(), e);
            FlashError::write(e)
        })?;
        fs::rename(&temp_path, &path).await.map_err(|e| {
            error!("Failed to replace {}: {}", path.display(), e);
            FlashError::write(e)
        })?;

        debug!("Stored '{}' in extension area {}", key, self.dir.display());
        Ok(())
    }
}

/// In-memory extension area whose availability and failures can be switched at runtime
#[derive(Default)]
pub struct MemoryExtensionStorage {
    values: Mutex<HashMap<String, Value>>,
    unavailable: AtomicBool,
    write_failure: Mutex<Option<String>>,
}

impl MemoryExtensionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Makes every following `set` fail with `message`
    pub fn fail_writes(&self, message: &str) {
        if let Ok(mut failure) = self.write_failure.lock() {
            *failure = Some(message.to_string());
        }
    }

    pub fn accept_writes(&self) {
        if let Ok(mut failure) = self.write_failure.lock() {
            *failure = None;
        }
    }
}

#[async_trait]
impl ExtensionStorage for MemoryExtensionStorage {
    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let values = self.values.lock().map_err(FlashError::read)?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let failure = self
            .write_failure
            .lock()
            .map_err(FlashError::write)?
            .clone();
        if let Some(message) = failure {
            return Err(FlashError::StorageWrite { message });
        }

        let mut values = self.values.lock().map_err(FlashError::write)?;
        values.insert(key.to_string(), value);
        Ok(())
    }
}
