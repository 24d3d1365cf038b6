//! Domain layer with transform entities, errors, and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;
/// Pure domain services.
pub mod services;

pub use entities::{CacheKey, FormatPreference, OptionOverrides, OutputFormat, TransformOptions, TransformedImage};
pub use errors::{CacheError, TransformError, TransformResult};
pub use ports::{ImageCodec, TransformCachePort};
pub use services::pick_format;
