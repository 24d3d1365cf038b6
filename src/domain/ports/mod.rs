mod codec_port;
mod transform_cache_port;

pub use codec_port::ImageCodec;
pub use transform_cache_port::TransformCachePort;
