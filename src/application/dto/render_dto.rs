//! Render DTOs.

use std::path::PathBuf;

use crate::domain::entities::{FormatPreference, OptionOverrides, TransformedImage};
use crate::infrastructure::image::TransformedStream;

/// Render request data.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    /// Source image path, already authorized by the caller.
    pub source: PathBuf,
    /// Requested dimensions and quality. Any format set here is replaced by
    /// the outcome of `format`.
    pub overrides: OptionOverrides,
    /// Output format selection.
    pub format: FormatPreference,
    /// Stream the output uncached instead of buffering it.
    pub stream: bool,
}

impl RenderRequest {
    /// Creates a buffered render request with default format selection.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, overrides: OptionOverrides) -> Self {
        Self {
            source: source.into(),
            overrides,
            format: FormatPreference::Default,
            stream: false,
        }
    }

    /// Sets the format selection.
    #[must_use]
    pub fn with_format(mut self, format: FormatPreference) -> Self {
        self.format = format;
        self
    }

    /// Requests streamed output.
    #[must_use]
    pub const fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Render response data.
#[derive(Debug)]
pub enum RenderResponse {
    /// Whole image in memory, possibly from cache.
    Buffered(TransformedImage),
    /// Uncached chunked output.
    Streamed(TransformedStream),
}

impl RenderResponse {
    /// MIME type of the output.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Buffered(image) => image.content_type,
            Self::Streamed(stream) => stream.content_type,
        }
    }
}
