//! Disk-based cache of encoded transform results.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::domain::entities::{CacheKey, TransformOptions};
use crate::domain::errors::{CacheError, CacheResult};
use crate::domain::ports::TransformCachePort;

/// Cache root used when nothing else is configured.
pub const DEFAULT_CACHE_DIR: &str = "./data/cache/images";

/// Stores each transform result as one file named by its [`CacheKey`].
///
/// An entry is fresh while its modification time is not older than the
/// source's. Entries are never evicted here; the directory grows until an
/// external process prunes it.
#[derive(Debug, Clone)]
pub struct DiskTransformCache {
    cache_dir: PathBuf,
}

impl DiskTransformCache {
    /// Creates a cache rooted at `cache_dir`. The directory is created on the
    /// first write.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    fn temp_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(format!(".{key}.{}.tmp", Uuid::new_v4().simple()))
    }

    async fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl TransformCachePort for DiskTransformCache {
    async fn lookup(&self, source: &Path, options: &TransformOptions) -> Option<Vec<u8>> {
        let key = CacheKey::derive(source, options);
        let path = self.entry_path(&key);

        let entry_modified = match fs::metadata(&path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(key = %key, error = %e, "Failed to stat cache entry");
                }
                trace!(key = %key, "Transform cache miss");
                return None;
            }
        };

        let source_modified = match fs::metadata(source).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                debug!(source = %source.display(), error = %e, "Failed to stat source");
                return None;
            }
        };

        if entry_modified < source_modified {
            trace!(key = %key, "Transform cache entry is stale");
            return None;
        }

        match fs::read(&path).await {
            Ok(bytes) => {
                trace!(key = %key, size = bytes.len(), "Transform cache hit");
                Some(bytes)
            }
            Err(e) => {
                debug!(key = %key, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    async fn store(
        &self,
        source: &Path,
        options: &TransformOptions,
        bytes: &[u8],
    ) -> CacheResult<()> {
        fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| CacheError::io("failed to create cache dir", &e))?;

        let key = CacheKey::derive(source, options);
        let path = self.entry_path(&key);
        let temp = self.temp_path(&key);

        if let Err(e) = Self::write_file(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io("failed to write cache entry", &e));
        }

        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(CacheError::io("failed to replace cache entry", &e));
        }

        debug!(key = %key, path = %path.display(), size = bytes.len(), "Stored transform in cache");
        Ok(())
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir.join(key.as_str())
    }
}
