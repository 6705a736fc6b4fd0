//! Chunk store that keeps the indexing pipeline informed.
//!
//! [`IndexedStore`] wraps any [`ChunkStoreBackend`], retries its transient
//! failures according to a [`RetryPolicy`], and reports every stored and
//! removed path as an [`IndexEvent`]. Whoever holds the receiving end of the
//! event channel is responsible for keeping the search index in sync.

use super::{ChunkReadStream, ChunkStoreBackend};
use crate::error::{Result, StoreError};
use crate::meta::IndexMeta;
use crate::path;
use crate::retry::{RetryPolicy, retry_if};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Notification for the indexing pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum IndexEvent {
    /// A chunk was stored and should be indexed
    Add { path: String, meta: Arc<IndexMeta> },
    /// Chunks were deleted and should be removed from the index
    Remove { paths: Vec<String> },
}

/// Coordinates a [`ChunkStoreBackend`] with index bookkeeping.
pub struct IndexedStore<B: ChunkStoreBackend> {
    backend: B,
    policy: RetryPolicy,
    events: Option<mpsc::UnboundedSender<IndexEvent>>,
}

impl<B: ChunkStoreBackend> IndexedStore<B> {
    pub fn new(backend: B, policy: RetryPolicy) -> Self {
        Self {
            backend,
            policy,
            events: None,
        }
    }

    /// Send an [`IndexEvent`] for every successful add and delete to `sender`
    pub fn with_index_events(mut self, sender: mpsc::UnboundedSender<IndexEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Store a chunk in `target_folder` (the root if empty) and return its path
    pub async fn add_chunk(
        &self,
        content: &[u8],
        target_folder: &str,
        meta: Arc<IndexMeta>,
    ) -> Result<String> {
        let path = retry_if(
            &self.policy,
            || self.backend.add_chunk(content, target_folder),
            StoreError::is_transient,
        )
        .await?;

        debug!(
            "Added chunk {} from {} (import {})",
            path, meta.from_file, meta.import_id
        );
        self.notify(IndexEvent::Add {
            path: path.clone(),
            meta,
        });
        Ok(path)
    }

    /// Open the chunk under `path` for reading
    pub async fn get_one(&self, path: &str) -> Result<ChunkReadStream> {
        retry_if(
            &self.policy,
            || self.backend.get_one(path),
            StoreError::is_transient,
        )
        .await
    }

    /// Total size of all stored chunks. Scans every chunk record.
    pub async fn get_size(&self) -> Result<u64> {
        retry_if(
            &self.policy,
            || self.backend.get_size(),
            StoreError::is_transient,
        )
        .await
    }

    /// Delete the given chunks in order.
    ///
    /// A failed batch is retried as a whole; chunks that are already gone are
    /// skipped by the backend, so paths deleted by an earlier attempt do not
    /// fail the retry. If the batch finally fails, the paths that were deleted
    /// on the way are still reported in an [`IndexEvent::Remove`].
    pub async fn delete_chunks(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let paths: Vec<String> = paths.iter().map(|p| path::normalize(p)).collect();
        let removed = Mutex::new(Vec::new());
        let result = {
            let (backend, paths, removed) = (&self.backend, &paths, &removed);
            retry_if(
                &self.policy,
                move || async move {
                    backend.delete_chunks(paths).await.inspect_err(|e| {
                        if let Ok(mut removed) = removed.lock() {
                            removed.extend_from_slice(e.deleted_paths());
                        }
                    })
                },
                StoreError::is_transient,
            )
            .await
        };

        match result {
            Ok(()) => {
                debug!("Deleted {} chunks", paths.len());
                self.notify(IndexEvent::Remove { paths });
                Ok(())
            }
            Err(e) => {
                let removed = removed.into_inner().unwrap_or_default();
                if !removed.is_empty() {
                    warn!(
                        "Deleted {} of {} chunks before failing: {}",
                        removed.len(),
                        paths.len(),
                        e
                    );
                    self.notify(IndexEvent::Remove { paths: removed });
                }
                Err(e)
            }
        }
    }

    fn notify(&self, event: IndexEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Index event receiver is gone, dropping event");
            }
        }
    }
}
