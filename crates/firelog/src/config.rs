//! Configuration management for firelog.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::kv::DEFAULT_KEY_PREFIX;
use crate::storage::Backend;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "firelog";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "firelog.db";

/// Default key-value document name.
const KV_FILE_NAME: &str = "extinguishers.json";

/// Prefix for environment overrides. Nested keys are separated by `__`,
/// as in `FIRELOG_STORAGE__KEY_PREFIX`.
const ENV_PREFIX: &str = "FIRELOG_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FIRELOG_`)
/// 2. TOML config file at `~/.config/firelog/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Scan device configuration.
    pub scanner: ScannerConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend holds the records.
    pub backend: Backend,
    /// Path to the database file for the `sqlite` backend.
    /// Defaults to `~/.local/share/firelog/firelog.db`
    pub database_path: Option<PathBuf>,
    /// Path to the document for the `file` backend.
    /// Defaults to `~/.local/share/firelog/extinguishers.json`
    pub kv_path: Option<PathBuf>,
    /// Key namespace used by the `file` backend.
    pub key_prefix: String,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Path prefix for the API routes. Empty mounts them at the root.
    pub base_path: String,
}

/// Scan device configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Device to read codes from. Reads stdin when unset.
    pub device: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            database_path: None, // Will be resolved to default at runtime
            kv_path: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            base_path: "/api".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `FIRELOG_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;

        let prefix = &self.storage.key_prefix;
        if prefix.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "key_prefix must not be empty".to_string(),
            });
        }
        if prefix.contains(':') {
            return Err(Error::ConfigValidation {
                message: format!("key_prefix must not contain ':' (got {prefix:?})"),
            });
        }

        let base = &self.server.base_path;
        if !base.is_empty() && !base.starts_with('/') {
            return Err(Error::ConfigValidation {
                message: format!("base_path must start with '/' (got {base:?})"),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the key-value document path, resolving defaults if not set.
    #[must_use]
    pub fn kv_path(&self) -> PathBuf {
        self.storage
            .kv_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(KV_FILE_NAME))
    }

    /// Parse the server bind address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.server
            .bind
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid bind address: {}", self.server.bind),
            })
    }

    /// The API base path without a trailing slash. `/` and `""` both mean the
    /// root.
    #[must_use]
    pub fn base_path(&self) -> &str {
        self.server.base_path.trim_end_matches('/')
    }
}
