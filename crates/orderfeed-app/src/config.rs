//! Application configuration.

use crate::error::{AppError, AppResult};
use orderfeed_feed::FeedConfig;
use orderfeed_persistence::{FileStore, KeyValueStore, MemoryStore};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

/// Config file used when neither `--config` nor `ORDERFEED_CONFIG` is set.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Persistent store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per key under `dir`.
    #[default]
    File,
    /// Process memory only; nothing survives a restart.
    Memory,
}

/// Persistent store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Directory for the file backend. Default: "data".
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

fn default_storage_dir() -> String {
    "data".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_storage_dir(),
        }
    }
}

impl StorageConfig {
    /// Open the configured store.
    pub fn open(&self) -> Arc<dyn KeyValueStore> {
        match self.backend {
            StorageBackend::File => Arc::new(FileStore::new(&self.dir)),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Load from `ORDERFEED_CONFIG` or the default path.
    ///
    /// A missing file is not an error: defaults are used.
    pub fn load() -> AppResult<Self> {
        let config_path =
            std::env::var("ORDERFEED_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.feed
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;
        if self.storage.backend == StorageBackend::File && self.storage.dir.trim().is_empty() {
            return Err(AppError::Config(
                "storage.dir must be set for the file backend".to_string(),
            ));
        }
        Ok(())
    }
}
