//! Application configuration.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::entities::TransformOptions;
use crate::infrastructure::image::{DEFAULT_CACHE_DIR, DEFAULT_CHUNK_SIZE, TransformerConfig};

use super::args::CliArgs;

const APP_NAME: &str = "pixcache";
const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "linuxmobile";

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Configuration file the values were read from.
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Root directory of the transform cache.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Collapse concurrent misses for the same key.
    #[serde(default = "default_true")]
    pub coalesce_in_flight: bool,

    /// Chunk size in bytes for streamed output.
    #[serde(default = "default_stream_chunk_size")]
    pub stream_chunk_size: usize,

    /// Values applied to omitted request fields.
    #[serde(default)]
    pub defaults: TransformOptions,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

fn default_true() -> bool {
    true
}

fn default_stream_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(config_path) = &args.config {
            self.config = Some(config_path.clone());
        }
        if let Some(cache_dir) = &args.cache_dir {
            self.cache_dir.clone_from(cache_dir);
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if args.no_coalesce {
            self.coalesce_in_flight = false;
        }
    }

    /// Builds the transformer configuration.
    #[must_use]
    pub fn transformer_config(&self) -> TransformerConfig {
        TransformerConfig {
            defaults: self.defaults.normalized(),
            coalesce_in_flight: self.coalesce_in_flight,
            stream_chunk_size: self.stream_chunk_size,
        }
    }

    /// Returns the platform configuration directory.
    #[must_use]
    pub fn default_config_dir() -> Option<PathBuf> {
        ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            cache_dir: default_cache_dir(),
            log_level: LogLevel::Info,
            coalesce_in_flight: true,
            stream_chunk_size: DEFAULT_CHUNK_SIZE,
            defaults: TransformOptions::default(),
        }
    }
}
