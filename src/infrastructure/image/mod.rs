//! Image handling infrastructure.
//!
//! This module provides:
//! - The `image` crate codec adapter
//! - Disk caching of encoded transforms
//! - Transform orchestration with detached write-back
//! - Chunked streaming output

pub mod codec;
pub mod disk_cache;
pub mod stream;
pub mod transformer;

pub use codec::ImageRsCodec;
pub use disk_cache::{DEFAULT_CACHE_DIR, DiskTransformCache};
pub use stream::{DEFAULT_CHUNK_SIZE, TransformedStream};
pub use transformer::{ImageTransformer, TransformerConfig};
