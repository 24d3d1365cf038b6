//! Infrastructure layer with filesystem and codec adapters.

/// Application configuration.
pub mod config;
/// Image handling (codec, disk cache, transform orchestration).
pub mod image;

pub use config::{AppConfig, CliArgs, ConfigLoader, LogLevel};
pub use self::image::{DiskTransformCache, ImageRsCodec, ImageTransformer, TransformerConfig};
