//! Port definition for transform result caching.

use std::path::{Path, PathBuf};

use crate::domain::entities::{CacheKey, TransformOptions};
use crate::domain::errors::CacheResult;

/// Port for persisting encoded transform results.
/// Implementations must be thread-safe.
#[async_trait::async_trait]
pub trait TransformCachePort: Send + Sync {
    /// Returns the stored bytes for `source` + `options` if a fresh entry
    /// exists. Any storage failure is reported as a miss.
    async fn lookup(&self, source: &Path, options: &TransformOptions) -> Option<Vec<u8>>;

    /// Stores `bytes` as the entry for `source` + `options`, replacing any
    /// previous content.
    async fn store(
        &self,
        source: &Path,
        options: &TransformOptions,
        bytes: &[u8],
    ) -> CacheResult<()>;

    /// Returns where the entry for `key` lives.
    fn entry_path(&self, key: &CacheKey) -> PathBuf;
}
