//! `image` crate adapter for the codec port.

use std::borrow::Cow;
use std::io::Write;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageReader};

use crate::domain::entities::{OutputFormat, ResizeBounds};
use crate::domain::errors::{TransformError, TransformResult};
use crate::domain::ports::ImageCodec;

/// Codec backed by the `image` crate, with libwebp for lossy WebP output.
///
/// JPEG and WebP honour the quality setting. PNG is lossless and ignores it.
#[derive(Debug, Clone, Copy)]
pub struct ImageRsCodec {
    filter: FilterType,
}

impl ImageRsCodec {
    /// Creates a codec using the given resampling filter.
    #[must_use]
    pub const fn with_filter(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl Default for ImageRsCodec {
    fn default() -> Self {
        Self::with_filter(FilterType::Lanczos3)
    }
}

impl ImageCodec for ImageRsCodec {
    fn decode(&self, bytes: &[u8]) -> TransformResult<DynamicImage> {
        image::load_from_memory(bytes).map_err(TransformError::decode)
    }

    fn decode_path(&self, path: &Path) -> TransformResult<DynamicImage> {
        let reader = ImageReader::open(path)
            .and_then(ImageReader::with_guessed_format)
            .map_err(|e| TransformError::source_read(path, &e))?;
        reader.decode().map_err(TransformError::decode)
    }

    fn resize(&self, image: DynamicImage, bounds: ResizeBounds) -> DynamicImage {
        image.resize(bounds.width, bounds.height, self.filter)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: u8,
        out: &mut dyn Write,
    ) -> TransformResult<()> {
        let result = match format {
            OutputFormat::Jpeg => {
                let image = jpeg_compatible(image);
                image.write_with_encoder(JpegEncoder::new_with_quality(out, quality))
            }
            OutputFormat::Png => image.write_with_encoder(PngEncoder::new(out)),
            OutputFormat::Webp => return encode_webp(image, quality, out),
        };
        result.map_err(TransformError::encode)
    }
}

fn encode_webp(image: &DynamicImage, quality: u8, out: &mut dyn Write) -> TransformResult<()> {
    let image = webp_compatible(image);
    let encoded = webp::Encoder::from_image(&image)
        .map_err(TransformError::encode)?
        .encode_simple(false, f32::from(quality))
        .map_err(|e| TransformError::encode(format!("{e:?}")))?;
    out.write_all(&encoded).map_err(TransformError::encode)
}

/// JPEG has no alpha channel and only 8-bit samples.
fn jpeg_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::L8 | ColorType::Rgb8 => Cow::Borrowed(image),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}

/// libwebp takes 8-bit RGB or RGBA only.
fn webp_compatible(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image.color() {
        ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(image),
        color if color.has_alpha() => Cow::Owned(DynamicImage::ImageRgba8(image.to_rgba8())),
        _ => Cow::Owned(DynamicImage::ImageRgb8(image.to_rgb8())),
    }
}
