//! Port definition for the pixel codec.

use std::io::Write;
use std::path::Path;

use image::DynamicImage;

use crate::domain::entities::{OutputFormat, ResizeBounds, TransformOptions};
use crate::domain::errors::{TransformError, TransformResult};

/// Decodes, resizes and encodes images.
///
/// Every method is CPU bound and blocking; callers run them off the async
/// executor.
pub trait ImageCodec: Send + Sync {
    /// Decodes an in-memory image.
    ///
    /// # Errors
    /// Returns [`TransformError::Decode`] for corrupt or unsupported input.
    fn decode(&self, bytes: &[u8]) -> TransformResult<DynamicImage>;

    /// Decodes an image by reading it from disk.
    ///
    /// # Errors
    /// Returns [`TransformError::SourceRead`] if the file cannot be read, or a
    /// decode error.
    fn decode_path(&self, path: &Path) -> TransformResult<DynamicImage> {
        let bytes = std::fs::read(path).map_err(|e| TransformError::source_read(path, &e))?;
        self.decode(&bytes)
    }

    /// Scales `image` to fit inside `bounds`, preserving aspect ratio.
    fn resize(&self, image: DynamicImage, bounds: ResizeBounds) -> DynamicImage;

    /// Encodes `image` into `out`.
    ///
    /// # Errors
    /// Returns [`TransformError::Encode`] if encoding or writing fails.
    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
        out: &mut dyn Write,
    ) -> TransformResult<()>;

    /// Applies the resize policy of `options` and encodes the result.
    ///
    /// # Errors
    /// Returns an encode error.
    fn render(
        &self,
        image: DynamicImage,
        options: &TransformOptions,
        out: &mut dyn Write,
    ) -> TransformResult<()> {
        let image = match ResizeBounds::from_options(options, image.width(), image.height()) {
            Some(bounds) => self.resize(image, bounds),
            None => image,
        };
        self.encode(&image, options.format, options.quality, out)
    }
}
