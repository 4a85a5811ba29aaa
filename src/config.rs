use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::cache::DEFAULT_CACHE_TIMEOUT;
use crate::error::ConfigError;
use crate::update::DEFAULT_SOURCE_URL;

/// Application name used for data directories and the log file
pub const APP_NAME: &str = "product-details";

/// Settings structure, read from an optional JSON file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Base URL of the published product details
    pub source_url: String,
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub log: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Settings {
    /// Read settings from `path`. Without a path, `config.json` in the data
    /// directory is used if it exists, otherwise defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => {
                let default_path = data_dir().join("config.json");
                if !default_path.exists() {
                    return Ok(Self::default());
                }
                default_path
            }
        };

        debug!("Loading settings from {:?}", path);
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Which [`DocumentStore`](crate::storage::DocumentStore) backend to use
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Database,
}

/// Storage-related configuration
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root of the JSON file tree
    pub json_dir: Option<PathBuf>,
    /// SQLite database file
    pub db_path: Option<PathBuf>,
}

impl StorageConfig {
    pub fn json_dir(&self) -> PathBuf {
        self.json_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("json"))
    }

    pub fn db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| data_dir().join("product_details.db"))
    }
}

/// Cache-related configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfig {
    /// Lifetime of a cached collection in seconds
    pub timeout: u64,
    pub enabled: bool,
    /// Seconds to remember last-modified markers; 0 reads storage every time
    pub marker_check_interval: u64,
}

impl CacheConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn marker_check_interval(&self) -> Duration {
        Duration::from_secs(self.marker_check_interval)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CACHE_TIMEOUT.as_secs(),
            enabled: true,
            marker_check_interval: 0,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Write logs to this file instead of stderr
    pub file: Option<PathBuf>,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

/// Returns the path to the data directory for product-details.
/// Uses $XDG_DATA_HOME/product-details if XDG_DATA_HOME is set,
/// otherwise falls back to ~/.local/share/product-details,
/// or ./product-details if neither is available.
pub fn data_dir() -> PathBuf {
    data_dir_with_env(std::env::var("XDG_DATA_HOME").ok(), dirs::home_dir())
}

fn data_dir_with_env(xdg_data_home: Option<String>, home_dir: Option<PathBuf>) -> PathBuf {
    let data_dir = xdg_data_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));

    data_dir.join(APP_NAME)
}
