//! Transform error types.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type for transform operations.
pub type TransformResult<T> = std::result::Result<T, TransformError>;

/// Errors that fail a transform request.
///
/// Payloads are strings so one error can be handed to every caller waiting on
/// the same in-flight computation.
#[derive(Debug, Clone, Error)]
#[allow(missing_docs)]
pub enum TransformError {
    #[error("failed to read source {path}: {message}")]
    SourceRead { path: PathBuf, message: String },

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("failed to encode image: {0}")]
    Encode(String),

    #[error("transform task failed: {0}")]
    Task(String),

    #[error("output stream closed: {0}")]
    Stream(String),
}

impl TransformError {
    /// Creates a source read error.
    #[must_use]
    pub fn source_read(path: &Path, source: &std::io::Error) -> Self {
        Self::SourceRead {
            path: path.to_path_buf(),
            message: source.to_string(),
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl std::fmt::Display) -> Self {
        Self::Decode(message.to_string())
    }

    /// Creates an encode error.
    #[must_use]
    pub fn encode(message: impl std::fmt::Display) -> Self {
        Self::Encode(message.to_string())
    }

    /// True when the codec rejected the source image.
    #[must_use]
    pub const fn is_codec_failure(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Encode(_))
    }
}
