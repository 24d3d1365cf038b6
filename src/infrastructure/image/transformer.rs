//! Transform orchestration.
//!
//! Lookup -> codec -> detached write-back, with optional coalescing of
//! concurrent misses for the same key.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::domain::entities::{
    CacheKey, ImageSource, OptionOverrides, TransformOptions, TransformedImage,
};
use crate::domain::errors::{TransformError, TransformResult};
use crate::domain::ports::{ImageCodec, TransformCachePort};

use super::codec::ImageRsCodec;
use super::disk_cache::DiskTransformCache;
use super::stream::{ChannelWriter, DEFAULT_CHUNK_SIZE, STREAM_CHANNEL_CAPACITY, TransformedStream};

type SharedTransform = Shared<BoxFuture<'static, TransformResult<Bytes>>>;

/// Configuration for the transformer.
#[derive(Debug, Clone)]
pub struct TransformerConfig {
    /// Values applied to omitted request fields.
    pub defaults: TransformOptions,
    /// Collapse concurrent misses for one key into a single computation.
    pub coalesce_in_flight: bool,
    /// Chunk size for streamed output.
    pub stream_chunk_size: usize,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            defaults: TransformOptions::default(),
            coalesce_in_flight: true,
            stream_chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Serves transformed images, reusing fresh cache entries.
#[derive(Clone)]
pub struct ImageTransformer {
    cache: Arc<dyn TransformCachePort>,
    codec: Arc<dyn ImageCodec>,
    config: TransformerConfig,
    in_flight: Arc<Mutex<HashMap<CacheKey, SharedTransform>>>,
    pending_writes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl std::fmt::Debug for ImageTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageTransformer")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ImageTransformer {
    /// Creates a transformer over the given cache and codec.
    #[must_use]
    pub fn new(
        config: TransformerConfig,
        cache: Arc<dyn TransformCachePort>,
        codec: Arc<dyn ImageCodec>,
    ) -> Self {
        Self {
            cache,
            codec,
            config,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            pending_writes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Creates a transformer with a disk cache at `cache_dir` and the
    /// `image` crate codec.
    #[must_use]
    pub fn with_cache_dir(config: TransformerConfig, cache_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            config,
            Arc::new(DiskTransformCache::new(cache_dir)),
            Arc::new(ImageRsCodec::default()),
        )
    }

    /// Merges request overrides with the configured defaults.
    #[must_use]
    pub fn resolve(&self, overrides: &OptionOverrides) -> TransformOptions {
        overrides.resolve(&self.config.defaults)
    }

    /// Returns the cache key a request maps to.
    #[must_use]
    pub fn key_for(&self, source: &Path, overrides: &OptionOverrides) -> CacheKey {
        CacheKey::derive(source, &self.resolve(overrides))
    }

    /// Returns where the cache entry for a request lives.
    #[must_use]
    pub fn entry_path(&self, source: &Path, overrides: &OptionOverrides) -> PathBuf {
        self.cache.entry_path(&self.key_for(source, overrides))
    }

    /// Returns `source` transformed per `overrides`.
    ///
    /// A fresh cache entry is returned as is. Otherwise the codec runs and the
    /// result is written back in the background; cache failures never reach
    /// the caller.
    ///
    /// # Errors
    /// Returns an error if the source cannot be read, decoded or encoded.
    pub async fn get_transformed(
        &self,
        source: impl AsRef<Path>,
        overrides: &OptionOverrides,
    ) -> TransformResult<TransformedImage> {
        let source = source.as_ref();
        let options = self.resolve(overrides);

        if let Some(bytes) = self.cache.lookup(source, &options).await {
            trace!(source = %source.display(), format = %options.format, "Serving cached transform");
            return Ok(TransformedImage {
                bytes: Bytes::from(bytes),
                content_type: options.content_type(),
                source: ImageSource::Cache,
            });
        }

        let bytes = if self.config.coalesce_in_flight {
            self.compute_coalesced(source, options).await?
        } else {
            self.compute_and_store(source.to_path_buf(), options)
                .await?
        };

        Ok(TransformedImage {
            bytes,
            content_type: options.content_type(),
            source: ImageSource::Computed,
        })
    }

    /// Streams `source` transformed per `overrides`, bypassing the cache.
    ///
    /// The source is decoded from a buffered reader and the encoder writes
    /// straight into the returned stream.
    ///
    /// # Errors
    /// Returns an error if the source does not exist. Codec failures are
    /// delivered on the stream.
    pub async fn open_transformed_stream(
        &self,
        source: impl AsRef<Path>,
        overrides: &OptionOverrides,
    ) -> TransformResult<TransformedStream> {
        let source = source.as_ref().to_path_buf();
        let options = self.resolve(overrides);

        fs::metadata(&source)
            .await
            .map_err(|e| TransformError::source_read(&source, &e))?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let codec = self.codec.clone();
        let chunk_size = self.config.stream_chunk_size;
        let error_tx = tx.clone();

        debug!(source = %source.display(), format = %options.format, "Streaming transform");

        let task = tokio::task::spawn_blocking(move || {
            let mut writer = ChannelWriter::new(tx.clone(), chunk_size);
            let result = codec
                .decode_path(&source)
                .and_then(|image| codec.render(image, &options, &mut writer))
                .and_then(|()| writer.finish());
            if let Err(e) = result {
                debug!(source = %source.display(), error = %e, "Streamed transform failed");
                let _ = tx.blocking_send(Err(e));
            }
        });

        tokio::spawn(async move {
            if let Err(e) = task.await {
                let _ = error_tx
                    .send(Err(TransformError::Task(format!("stream task failed: {e}"))))
                    .await;
            }
        });

        Ok(TransformedStream::new(rx, options.content_type()))
    }

    /// Waits for every write-back started so far.
    pub async fn flush_pending_writes(&self) {
        let handles = std::mem::take(&mut *self.pending_writes.lock());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Cache write task failed");
            }
        }
    }

    /// Returns the number of computations currently in flight.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }

    async fn compute_coalesced(
        &self,
        source: &Path,
        options: TransformOptions,
    ) -> TransformResult<Bytes> {
        let key = CacheKey::derive(source, &options);

        let shared = {
            let mut in_flight = self.in_flight.lock();
            if let Some(existing) = in_flight.get(&key) {
                trace!(key = %key, "Joining in-flight transform");
                existing.clone()
            } else {
                let this = self.clone();
                let task_key = key.clone();
                let source = source.to_path_buf();
                // The task removes its own entry, so a caller that goes away
                // mid-computation cannot leave the key stuck.
                let handle = tokio::spawn(async move {
                    let result = this.compute_and_store(source, options).await;
                    this.in_flight.lock().remove(&task_key);
                    result
                });
                let shared = async move {
                    handle
                        .await
                        .map_err(|e| TransformError::Task(format!("transform task failed: {e}")))
                        .and_then(std::convert::identity)
                }
                .boxed()
                .shared();
                in_flight.insert(key, shared.clone());
                shared
            }
        };

        shared.await
    }

    async fn compute_and_store(
        &self,
        source: PathBuf,
        options: TransformOptions,
    ) -> TransformResult<Bytes> {
        let bytes = self.compute(&source, options).await?;
        self.spawn_store(source, options, bytes.clone());
        Ok(bytes)
    }

    async fn compute(&self, source: &Path, options: TransformOptions) -> TransformResult<Bytes> {
        let input = fs::read(source)
            .await
            .map_err(|e| TransformError::source_read(source, &e))?;

        let started = Instant::now();
        let codec = self.codec.clone();
        let output = tokio::task::spawn_blocking(move || -> TransformResult<Vec<u8>> {
            let image = codec.decode(&input)?;
            let mut out = Vec::new();
            codec.render(image, &options, &mut out)?;
            Ok(out)
        })
        .await
        .map_err(|e| TransformError::Task(format!("codec task panicked: {e}")))??;

        debug!(
            source = %source.display(),
            width = options.width,
            height = options.height,
            quality = options.quality,
            format = %options.format,
            size = output.len(),
            elapsed = ?started.elapsed(),
            "Transformed image"
        );

        Ok(Bytes::from(output))
    }

    fn spawn_store(&self, source: PathBuf, options: TransformOptions, bytes: Bytes) {
        let cache = self.cache.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = cache.store(&source, &options, &bytes).await {
                warn!(source = %source.display(), error = %e, "Failed to write transform cache entry");
            }
        });

        let mut pending = self.pending_writes.lock();
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::{OutputFormat, ResizeBounds};
    use crate::domain::ports::mocks::MockTransformCache;
    use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    /// Delegates to the real codec and counts decodes.
    #[derive(Default)]
    struct CountingCodec {
        inner: ImageRsCodec,
        decodes: AtomicUsize,
        delay: Duration,
    }

    impl CountingCodec {
        fn slow(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }

        fn decodes(&self) -> usize {
            self.decodes.load(Ordering::SeqCst)
        }
    }

    impl ImageCodec for CountingCodec {
        fn decode(&self, bytes: &[u8]) -> TransformResult<DynamicImage> {
            self.decodes.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            self.inner.decode(bytes)
        }

        fn resize(&self, image: DynamicImage, bounds: ResizeBounds) -> DynamicImage {
            self.inner.resize(image, bounds)
        }

        fn encode(
            &self,
            image: &DynamicImage,
            format: OutputFormat,
            quality: u8,
            out: &mut dyn Write,
        ) -> TransformResult<()> {
            self.inner.encode(image, format, quality, out)
        }
    }

    fn write_source(dir: &TempDir, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
            .save(&path)
            .unwrap();
        path
    }

    fn set_modified(path: &Path, time: SystemTime) {
        std::fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    fn disk_transformer(root: &Path, codec: Arc<CountingCodec>) -> ImageTransformer {
        ImageTransformer::new(
            TransformerConfig::default(),
            Arc::new(DiskTransformCache::new(root)),
            codec,
        )
    }

    fn thumbnail() -> OptionOverrides {
        OptionOverrides::default()
            .width(200)
            .quality(75)
            .format(OutputFormat::Webp)
    }

    #[tokio::test]
    async fn test_second_call_is_served_from_cache() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 500, 500);
        let codec = Arc::new(CountingCodec::default());
        let transformer = disk_transformer(&temp.path().join("cache"), codec.clone());

        let first = transformer
            .get_transformed(&source, &thumbnail())
            .await
            .unwrap();
        assert_eq!(first.source, ImageSource::Computed);
        assert_eq!(first.content_type, "image/webp");
        let decoded = image::load_from_memory(&first.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (200, 200));

        transformer.flush_pending_writes().await;
        assert!(transformer.entry_path(&source, &thumbnail()).is_file());

        let second = transformer
            .get_transformed(&source, &thumbnail())
            .await
            .unwrap();
        assert_eq!(second.source, ImageSource::Cache);
        assert_eq!(second.bytes, first.bytes);
        assert_eq!(codec.decodes(), 1);
    }

    #[tokio::test]
    async fn test_newer_source_triggers_recompute() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 120, 90);
        let codec = Arc::new(CountingCodec::default());
        let transformer = disk_transformer(&temp.path().join("cache"), codec.clone());
        let overrides = OptionOverrides::default().width(60);

        transformer
            .get_transformed(&source, &overrides)
            .await
            .unwrap();
        transformer.flush_pending_writes().await;

        let entry = transformer.entry_path(&source, &overrides);
        let an_hour_ago = SystemTime::now() - Duration::from_secs(3600);
        set_modified(&entry, an_hour_ago);
        set_modified(&source, SystemTime::now() - Duration::from_secs(60));

        let recomputed = transformer
            .get_transformed(&source, &overrides)
            .await
            .unwrap();
        assert_eq!(recomputed.source, ImageSource::Computed);
        assert_eq!(codec.decodes(), 2);

        transformer.flush_pending_writes().await;
        let rewritten = std::fs::metadata(&entry).unwrap().modified().unwrap();
        assert!(rewritten > an_hour_ago);

        let cached = transformer
            .get_transformed(&source, &overrides)
            .await
            .unwrap();
        assert_eq!(cached.source, ImageSource::Cache);
        assert_eq!(codec.decodes(), 2);
    }

    #[tokio::test]
    async fn test_no_constraint_keeps_source_dimensions() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.png", 150, 100);
        let transformer = disk_transformer(
            &temp.path().join("cache"),
            Arc::new(CountingCodec::default()),
        );

        let out = transformer
            .get_transformed(&source, &OptionOverrides::default().format(OutputFormat::Png))
            .await
            .unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (150, 100));
    }

    #[tokio::test]
    async fn test_larger_width_does_not_upscale() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.png", 150, 100);
        let transformer = disk_transformer(
            &temp.path().join("cache"),
            Arc::new(CountingCodec::default()),
        );

        let out = transformer
            .get_transformed(
                &source,
                &OptionOverrides::default()
                    .width(600)
                    .format(OutputFormat::Png),
            )
            .await
            .unwrap();
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (150, 100));
    }

    #[tokio::test]
    async fn test_unwritable_cache_does_not_fail_request() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 64, 64);
        let root = temp.path().join("occupied");
        std::fs::write(&root, b"not a directory").unwrap();
        let codec = Arc::new(CountingCodec::default());
        let transformer = disk_transformer(&root, codec.clone());

        let out = transformer
            .get_transformed(&source, &OptionOverrides::default())
            .await
            .unwrap();
        assert!(!out.bytes.is_empty());

        transformer.flush_pending_writes().await;

        let again = transformer
            .get_transformed(&source, &OptionOverrides::default())
            .await
            .unwrap();
        assert_eq!(again.source, ImageSource::Computed);
        assert_eq!(codec.decodes(), 2);
    }

    #[tokio::test]
    async fn test_failed_store_is_swallowed() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 32, 32);
        let cache = Arc::new(MockTransformCache::failing());
        let transformer = ImageTransformer::new(
            TransformerConfig::default(),
            cache.clone(),
            Arc::new(CountingCodec::default()),
        );

        let out = transformer
            .get_transformed(&source, &OptionOverrides::default())
            .await;
        assert!(out.is_ok());

        transformer.flush_pending_writes().await;
        assert_eq!(cache.writes(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.jpg");
        std::fs::write(&source, b"not really a jpeg").unwrap();
        let cache = Arc::new(MockTransformCache::default());
        let transformer = ImageTransformer::new(
            TransformerConfig::default(),
            cache.clone(),
            Arc::new(ImageRsCodec::default()),
        );

        let err = transformer
            .get_transformed(&source, &OptionOverrides::default())
            .await
            .unwrap_err();
        assert!(err.is_codec_failure());

        transformer.flush_pending_writes().await;
        assert_eq!(cache.writes(), 0);
        assert_eq!(transformer.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_is_an_error() {
        let temp = TempDir::new().unwrap();
        let transformer = ImageTransformer::with_cache_dir(
            TransformerConfig::default(),
            temp.path().join("cache"),
        );

        let err = transformer
            .get_transformed(temp.path().join("missing.jpg"), &OptionOverrides::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TransformError::SourceRead { .. }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_misses_are_coalesced() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 64, 64);
        let codec = Arc::new(CountingCodec::slow(Duration::from_millis(200)));
        let cache = Arc::new(MockTransformCache::default());
        let transformer =
            ImageTransformer::new(TransformerConfig::default(), cache.clone(), codec.clone());

        let overrides = OptionOverrides::default().width(32);
        let (a, b, c) = tokio::join!(
            transformer.get_transformed(&source, &overrides),
            transformer.get_transformed(&source, &overrides),
            transformer.get_transformed(&source, &overrides),
        );

        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(a.bytes, b.bytes);
        assert_eq!(b.bytes, c.bytes);
        assert_eq!(codec.decodes(), 1);

        transformer.flush_pending_writes().await;
        assert_eq!(cache.writes(), 1);
        assert_eq!(transformer.in_flight_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_without_coalescing_misses_race() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 64, 64);
        let codec = Arc::new(CountingCodec::slow(Duration::from_millis(200)));
        let config = TransformerConfig {
            coalesce_in_flight: false,
            ..TransformerConfig::default()
        };
        let transformer =
            ImageTransformer::new(config, Arc::new(MockTransformCache::default()), codec.clone());

        let overrides = OptionOverrides::default();
        let (a, b) = tokio::join!(
            transformer.get_transformed(&source, &overrides),
            transformer.get_transformed(&source, &overrides),
        );

        assert_eq!(a.unwrap().bytes, b.unwrap().bytes);
        assert_eq!(codec.decodes(), 2);
    }

    #[tokio::test]
    async fn test_stream_matches_and_skips_cache() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 500, 500);
        let root = temp.path().join("cache");
        let config = TransformerConfig {
            stream_chunk_size: 1024,
            ..TransformerConfig::default()
        };
        let transformer = ImageTransformer::with_cache_dir(config, &root);

        let stream = transformer
            .open_transformed_stream(&source, &thumbnail())
            .await
            .unwrap();
        assert_eq!(stream.content_type, "image/webp");

        let bytes = stream.into_bytes().await.unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (200, 200));

        transformer.flush_pending_writes().await;
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_stream_reports_missing_source_eagerly() {
        let temp = TempDir::new().unwrap();
        let transformer = ImageTransformer::with_cache_dir(
            TransformerConfig::default(),
            temp.path().join("cache"),
        );

        let result = transformer
            .open_transformed_stream(temp.path().join("missing.jpg"), &OptionOverrides::default())
            .await;
        assert!(matches!(result, Err(TransformError::SourceRead { .. })));
    }

    #[tokio::test]
    async fn test_stream_delivers_codec_errors() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("broken.png");
        std::fs::write(&source, b"garbage").unwrap();
        let transformer = ImageTransformer::with_cache_dir(
            TransformerConfig::default(),
            temp.path().join("cache"),
        );

        let stream = transformer
            .open_transformed_stream(&source, &OptionOverrides::default())
            .await
            .unwrap();
        assert!(stream.into_bytes().await.is_err());
    }

    #[tokio::test]
    async fn test_defaults_come_from_config() {
        let temp = TempDir::new().unwrap();
        let source = write_source(&temp, "snap.jpg", 40, 40);
        let config = TransformerConfig {
            defaults: TransformOptions {
                format: OutputFormat::Jpeg,
                quality: 60,
                ..TransformOptions::default()
            },
            ..TransformerConfig::default()
        };
        let transformer = ImageTransformer::with_cache_dir(config, temp.path().join("cache"));

        let out = transformer
            .get_transformed(&source, &OptionOverrides::default())
            .await
            .unwrap();
        assert_eq!(out.content_type, "image/jpeg");
        assert_eq!(
            transformer.key_for(&source, &OptionOverrides::default()),
            transformer.key_for(
                &source,
                &OptionOverrides::default()
                    .quality(60)
                    .format(OutputFormat::Jpeg)
            )
        );
    }
}
