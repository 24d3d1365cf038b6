//! Cache storage error types.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors raised while writing cache entries.
///
/// Never surfaced to callers of the transformer; logged and dropped.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// I/O error during a cache operation.
    #[error("cache io error: {0}")]
    Io(String),
}

impl CacheError {
    /// Creates an I/O error with context.
    #[must_use]
    pub fn io(context: &str, source: &std::io::Error) -> Self {
        Self::Io(format!("{context}: {source}"))
    }
}
