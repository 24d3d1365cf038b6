use super::app_config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Explicitly requested file does not exist.
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    /// File could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// File is not valid TOML for [`AppConfig`].
    #[error("toml deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

/// Locates and reads the configuration file.
pub struct ConfigLoader {
    config_dir: Option<PathBuf>,
}

impl ConfigLoader {
    /// Creates a loader looking in the platform config directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: AppConfig::default_config_dir(),
        }
    }

    /// Creates a loader with a specific directory (useful for testing).
    #[must_use]
    pub fn with_dir(path: PathBuf) -> Self {
        Self {
            config_dir: Some(path),
        }
    }

    /// Loads the application configuration.
    ///
    /// An explicit `path_override` must exist and parse. The implicit file
    /// in the config directory is optional, and a malformed one falls back to
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an explicit file is missing, unreadable or
    /// malformed, or if the implicit file exists but cannot be read.
    pub fn load_config(&self, path_override: Option<&Path>) -> Result<AppConfig, ConfigError> {
        if let Some(path) = path_override {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            let content = fs::read_to_string(path)?;
            let mut config = toml::from_str::<AppConfig>(&content)?;
            config.config = Some(path.to_path_buf());
            return Ok(config);
        }

        let Some(config_path) = self.config_dir.as_ref().map(|dir| dir.join(CONFIG_FILE_NAME))
        else {
            return Ok(AppConfig::default());
        };

        if !config_path.exists() {
            debug!("Config file not found at {:?}, using defaults.", config_path);
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&config_path)?;
        match toml::from_str::<AppConfig>(&content) {
            Ok(mut config) => {
                config.config = Some(config_path);
                Ok(config)
            }
            Err(e) => {
                warn!("Failed to parse config file: {}. Using defaults.", e);
                Ok(AppConfig::default())
            }
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
