//! geochunk-store: Chunk storage for geospatial imports
//!
//! This crate persists opaque chunks of geospatial content under hierarchical
//! paths, attaches provenance metadata to each import, and hands stored and
//! removed paths to an external indexing pipeline.
//!
//! ## Key Modules
//!
//! - **[`storage`]**: Backend trait, SQLite backend and the [`IndexedStore`](storage::indexed::IndexedStore)
//! - **[`retry`]**: Retrying async operations with a fixed delay
//! - **[`meta`]**: Import metadata ([`IndexMeta`](meta::IndexMeta))
//! - **[`path`]** and **[`ids`]**: Chunk path helpers and unique id generation
//! - **[`config`]**: TOML configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use geochunk_store::{
//!     config::StoreConfig,
//!     meta::IndexMeta,
//!     storage::{indexed::IndexedStore, sqlite_store::SqliteBackend},
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StoreConfig::memory();
//! let store = IndexedStore::new(SqliteBackend::new(config.clone())?, config.retry_policy());
//!
//! let meta = Arc::new(IndexMeta::new("import-1", "city.gml", chrono::Utc::now()));
//! let path = store.add_chunk(b"<cityObjectMember/>", "/berlin", meta).await?;
//! let content = store.get_one(&path).await?.read_to_end().await?;
//! store.delete_chunks(&[path]).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! caller ─ bytes + IndexMeta ─> IndexedStore ─ retry ─> ChunkStoreBackend ─> SQLite bucket
//!                                    │
//!                                    └─ IndexEvent ─> indexing pipeline
//! ```

pub mod config;
pub mod error;
pub mod ids;
pub mod meta;
pub mod path;
pub mod retry;
pub mod storage;

pub use error::{Result, StoreError};
