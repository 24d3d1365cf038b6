//! Domain error types.

mod cache_error;
mod transform_error;

pub use cache_error::{CacheError, CacheResult};
pub use transform_error::{TransformError, TransformResult};
