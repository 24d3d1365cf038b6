//! Chunked output for streamed transforms.

use std::io::{self, Write};
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures_util::stream::{Stream, StreamExt};
use tokio::sync::mpsc;

use crate::domain::errors::{TransformError, TransformResult};

/// Default size of each emitted chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Chunks buffered between the encoder and the consumer.
pub const STREAM_CHANNEL_CAPACITY: usize = 4;

pub(crate) type ChunkSender = mpsc::Sender<TransformResult<Bytes>>;

/// Blocking writer that forwards encoder output as fixed-size chunks.
///
/// Must only be used from a blocking thread.
pub(crate) struct ChannelWriter {
    tx: ChunkSender,
    buf: BytesMut,
    chunk_size: usize,
}

impl ChannelWriter {
    pub(crate) fn new(tx: ChunkSender, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tx,
            buf: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    fn send(&self, chunk: Bytes) -> io::Result<()> {
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "stream consumer went away"))
    }

    /// Emits whatever is still buffered.
    pub(crate) fn finish(mut self) -> TransformResult<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let rest = self.buf.split().freeze();
        self.send(rest)
            .map_err(|e| TransformError::Stream(e.to_string()))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            let chunk = self.buf.split_to(self.chunk_size).freeze();
            self.send(chunk)?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Uncached transform output delivered chunk by chunk.
#[derive(Debug)]
pub struct TransformedStream {
    /// MIME type, `image/<format>`.
    pub content_type: &'static str,
    rx: mpsc::Receiver<TransformResult<Bytes>>,
}

impl TransformedStream {
    pub(crate) const fn new(
        rx: mpsc::Receiver<TransformResult<Bytes>>,
        content_type: &'static str,
    ) -> Self {
        Self { content_type, rx }
    }

    /// Drains the stream into one buffer.
    ///
    /// # Errors
    /// Returns the first error emitted by the pipeline.
    pub async fn into_bytes(mut self) -> TransformResult<Bytes> {
        let mut out = BytesMut::new();
        while let Some(chunk) = self.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out.freeze())
    }
}

impl Stream for TransformedStream {
    type Item = TransformResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
