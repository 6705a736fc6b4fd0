//! Storage abstraction layer for geochunk
//!
//! This module provides a trait-based abstraction for storing and retrieving
//! chunks as opaque binary blobs under hierarchical paths. Backends know
//! nothing about indexing; [`indexed::IndexedStore`] adds retries and hands
//! every stored or removed path to the indexing pipeline.
//!
//! ## Key Components
//!
//! - **ChunkStoreBackend**: Write, stream, measure and delete chunks
//! - **ChunkReadStream**: Forward-only stream over one stored chunk
//! - **IndexedStore**: Coordinates a backend with index bookkeeping
//! - **SqliteBackend**: Concrete backend storing chunks as segmented blobs
//!
//! ## Architecture
//!
//! ```text
//! IndexedStore ── RetryPolicy
//!      │     └──── IndexEvent channel ──> indexing pipeline
//!      ▼
//! ChunkStoreBackend ── SqliteBackend (files + segments tables)
//! ```

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};

pub mod indexed;
pub mod sqlite_store;

/// Physical storage operations for chunks.
#[async_trait]
pub trait ChunkStoreBackend: Send + Sync {
    /// Store `content` as a new chunk inside the folder `path` and return the
    /// path of the new chunk. The file name is generated by the backend.
    async fn add_chunk(&self, content: &[u8], path: &str) -> Result<String>;

    /// Open a stream over the chunk stored under `path`
    async fn get_one(&self, path: &str) -> Result<ChunkReadStream>;

    /// Total number of bytes of all stored chunks
    async fn get_size(&self) -> Result<u64>;

    /// Delete the chunks under the given paths, one after the other.
    ///
    /// Paths that do not exist are skipped. The first failure aborts the
    /// remaining deletions; chunks deleted before it stay deleted and are
    /// reported through [`StoreError::PartialDelete`](crate::StoreError::PartialDelete).
    async fn delete_chunks(&self, paths: &[String]) -> Result<()>;
}

/// A sequential, single-consumer stream over the segments of one chunk.
///
/// The total length and the segment size are known before the first segment
/// is read, so callers can size their buffers up front. The stream cannot be
/// rewound; open the chunk again to read it a second time.
pub struct ChunkReadStream {
    length: u64,
    segment_size: usize,
    inner: BoxStream<'static, Result<Vec<u8>>>,
}

impl ChunkReadStream {
    pub fn new(length: u64, segment_size: usize, inner: BoxStream<'static, Result<Vec<u8>>>) -> Self {
        Self {
            length,
            segment_size,
            inner,
        }
    }

    /// Total size of the chunk in bytes
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Size of the segments yielded by this stream (the last one may be shorter)
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Read all remaining segments into one buffer
    pub async fn read_to_end(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.length as usize);
        while let Some(segment) = self.inner.next().await {
            buf.extend_from_slice(&segment?);
        }
        Ok(buf)
    }
}

impl Stream for ChunkReadStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for ChunkReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkReadStream")
            .field("length", &self.length)
            .field("segment_size", &self.segment_size)
            .finish_non_exhaustive()
    }
}
