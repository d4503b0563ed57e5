//! Configuration loading
//!
//! A single TOML file. Every field has a default, so a missing file or a
//! partial one is fine.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use pairup_net::{DEFAULT_SERVER_URL, DEFAULT_VERIFY_URL};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV: &str = "PAIRUP_CONFIG";

const CONFIG_FILE: &str = "pairup.toml";

/// Error type for config loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Server endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// WebSocket endpoint for matchmaking and chat
    pub url: String,
    /// HTTP endpoint for selfie verification
    pub verify_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SERVER_URL.to_string(),
            verify_url: DEFAULT_VERIFY_URL.to_string(),
        }
    }
}

/// Our pseudonymous profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub nickname: String,
    pub bio: String,
    /// Selfie used for the one-time verification
    pub selfie: Option<PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            nickname: "Stranger".to_string(),
            bio: String::new(),
            selfie: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub profile: ProfileConfig,
    /// Where the database lives. Defaults to the platform data dir.
    pub data_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load from `$PAIRUP_CONFIG` or the platform config dir
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => Self::default_path()?,
        };
        Self::load_from(&path)
    }

    /// Load from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("dev", "pairup", "pairup").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join(CONFIG_FILE))
    }
}
