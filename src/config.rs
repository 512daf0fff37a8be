use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use directories::ProjectDirs;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{FlashError, Result};

/// Which storage area the persistence adapter writes to.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Extension area when available, local area otherwise
    #[default]
    Auto,
    /// Always the extension area
    Extension,
    /// Always the local area
    Local,
}

/// Application configuration settings.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Directory holding both storage areas
    pub data_dir: PathBuf,

    /// Preferred storage backend
    pub backend: Backend,

    /// How long deleted notes stay in history (in minutes)
    pub retention_minutes: u32,

    /// How often the expiry sweeper runs (in seconds)
    pub sweep_interval_secs: u64,

    /// Whether deleted notes are written to storage as well
    pub persist_history: bool,

    /// Whether the host badge API is available
    pub badge: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("dev", "flash-notes", "flash-notes")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".flash-notes"));

        Config {
            data_dir,
            backend: Backend::Auto,
            retention_minutes: 60,
            sweep_interval_secs: 300,
            persist_history: false,
            badge: true,
        }
    }
}

impl Config {
    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "flash-notes", "flash-notes")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Reads the configuration from `path`, falling back to defaults when the file is absent
    pub fn load(path: &Path) -> Result<Config> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| FlashError::ConfigError {
            message: format!("{}: {}", path.display(), e),
        })
    }

    /// Writes the configuration to `path`, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| FlashError::DirectoryError {
                path: parent.to_path_buf(),
            })?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        info!("Configuration written to {}", path.display());
        Ok(())
    }

    /// Directory of the asynchronous extension storage area
    pub fn extension_dir(&self) -> PathBuf {
        self.data_dir.join("extension")
    }

    /// File backing the synchronous local storage area
    pub fn local_storage_path(&self) -> PathBuf {
        self.data_dir.join("local_storage.json")
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.retention_minutes))
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.retention_minutes, 60);
        assert_eq!(config.sweep_interval_secs, 300);
        assert_eq!(config.backend, Backend::Auto);
        assert!(!config.persist_history);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"backend":"local","persist_history":true}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert!(config.persist_history);
        assert_eq!(config.retention(), chrono::Duration::hours(1));
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Config::load(&path),
            Err(FlashError::ConfigError { .. })
        ));
    }

    #[test]
    fn save_then_load_keeps_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            retention_minutes: 5,
            ..Config::default()
        };
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.retention_minutes, 5);
        assert_eq!(loaded.data_dir, dir.path());
    }
}
