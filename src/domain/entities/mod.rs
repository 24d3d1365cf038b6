//! Domain entity definitions.

mod cache_key;
mod transform;

pub use cache_key::{CacheKey, MAX_KEY_LEN};
pub use transform::{
    DEFAULT_QUALITY, FormatPreference, ImageSource, MAX_QUALITY, MIN_QUALITY, OptionOverrides, OutputFormat,
    ResizeBounds, TransformOptions, TransformedImage,
};
