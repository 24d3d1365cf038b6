//! Transform parameters and transform results.

use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Default JPEG/WebP quality applied when a request omits it.
pub const DEFAULT_QUALITY: u8 = 80;

/// Lowest quality accepted after normalization.
pub const MIN_QUALITY: u8 = 1;

/// Highest quality accepted after normalization.
pub const MAX_QUALITY: u8 = 100;

/// Output encoding of a transformed image.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// WebP (modern format).
    #[default]
    Webp,
    /// JPEG (conservative fallback).
    Jpeg,
    /// PNG.
    Png,
}

impl OutputFormat {
    /// File extension used for cache entries.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    /// MIME type of the encoded output.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// How the output format of a request is chosen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormatPreference {
    /// Use the configured default format.
    #[default]
    Default,
    /// Use exactly this format.
    Explicit(OutputFormat),
    /// Negotiate from the client's `Accept` header, which may be absent.
    Negotiate(Option<String>),
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("unsupported output format: {other}")),
        }
    }
}

/// Fully normalized transform parameters.
///
/// Every field is always present; build one from [`OptionOverrides::resolve`]
/// so that omitted values and explicit defaults are indistinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformOptions {
    /// Maximum output width, 0 for no constraint.
    pub width: u32,
    /// Maximum output height, 0 for no constraint.
    pub height: u32,
    /// Encoder quality in `1..=100`.
    pub quality: u8,
    /// Output encoding.
    pub format: OutputFormat,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            quality: DEFAULT_QUALITY,
            format: OutputFormat::default(),
        }
    }
}

impl TransformOptions {
    /// Returns a copy with quality clamped into the accepted range.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            quality: self.quality.clamp(MIN_QUALITY, MAX_QUALITY),
            ..self
        }
    }

    /// True when neither dimension is constrained.
    #[must_use]
    pub const fn skips_resize(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    /// MIME type of the output this request produces.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Caller-supplied transform parameters; any field may be omitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionOverrides {
    /// Requested maximum width.
    pub width: Option<u32>,
    /// Requested maximum height.
    pub height: Option<u32>,
    /// Requested quality.
    pub quality: Option<u8>,
    /// Requested output encoding.
    pub format: Option<OutputFormat>,
}

impl OptionOverrides {
    /// Sets the width.
    #[must_use]
    pub const fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the height.
    #[must_use]
    pub const fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Sets the quality.
    #[must_use]
    pub const fn quality(mut self, quality: u8) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Sets the output format.
    #[must_use]
    pub const fn format(mut self, format: OutputFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Merges with `defaults` and normalizes the result.
    #[must_use]
    pub fn resolve(&self, defaults: &TransformOptions) -> TransformOptions {
        TransformOptions {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
            quality: self.quality.unwrap_or(defaults.quality),
            format: self.format.unwrap_or(defaults.format),
        }
        .normalized()
    }
}

/// Shrink-only bounding box for a resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeBounds {
    /// Box width.
    pub width: u32,
    /// Box height.
    pub height: u32,
}

impl ResizeBounds {
    /// Computes the box a `source_width` x `source_height` image must fit in.
    ///
    /// Returns `None` when no resize is needed: both dimensions are
    /// unconstrained, or the image already fits inside the requested box.
    /// An unconstrained dimension falls back to the source's, and a requested
    /// dimension larger than the source is capped so nothing is enlarged.
    #[must_use]
    pub fn from_options(
        options: &TransformOptions,
        source_width: u32,
        source_height: u32,
    ) -> Option<Self> {
        if options.skips_resize() {
            return None;
        }

        let cap = |requested: u32, source: u32| {
            if requested == 0 {
                source
            } else {
                requested.min(source)
            }
        };

        let bounds = Self {
            width: cap(options.width, source_width),
            height: cap(options.height, source_height),
        };

        if bounds.width == source_width && bounds.height == source_height {
            None
        } else {
            Some(bounds)
        }
    }
}

/// Where a transformed image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Served from a fresh cache entry.
    Cache,
    /// Produced by the codec for this request.
    Computed,
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cache => write!(f, "cache"),
            Self::Computed => write!(f, "computed"),
        }
    }
}

/// Encoded result of a transform.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    /// Encoded image bytes.
    pub bytes: Bytes,
    /// MIME type, `image/<format>`.
    pub content_type: &'static str,
    /// Whether the bytes came from the cache.
    pub source: ImageSource,
}
