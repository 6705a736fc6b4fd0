//! SQLite implementation of [`ChunkStoreBackend`]
//!
//! Chunks are kept in a "bucket" made of two tables, modelled after blob
//! stores that split large objects into fixed-size pieces:
//!
//! ```sql
//! -- one row per stored chunk
//! CREATE TABLE <db>_<bucket>_files (
//!     id TEXT PRIMARY KEY,             -- ObjectId as hex
//!     filename TEXT NOT NULL,          -- normalized chunk path
//!     length INTEGER NOT NULL,         -- total size in bytes
//!     segment_size INTEGER NOT NULL,   -- size of each segment
//!     upload_date TIMESTAMP NOT NULL
//! );
//!
//! -- the content, split into segments
//! CREATE TABLE <db>_<bucket>_segments (
//!     file_id TEXT NOT NULL,
//!     n INTEGER NOT NULL,              -- segment number, starting at 0
//!     data BLOB NOT NULL,
//!     PRIMARY KEY (file_id, n)
//! );
//! ```
//!
//! A chunk's file row and segments are written and deleted in a single
//! transaction. The connection pool, the database handle and the bucket are
//! created on first use, at most once per backend.

use super::{ChunkReadStream, ChunkStoreBackend};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::ids::ObjectId;
use crate::path;
use async_trait::async_trait;
use chrono::Utc;
use futures::{StreamExt, TryStreamExt};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Physical record behind a chunk path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub filename: String,
    pub length: u64,
    pub segment_size: usize,
}

/// A named database inside the connected SQLite instance
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    name: String,
}

impl Database {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The pair of tables holding file records and their segments
#[derive(Debug, Clone)]
pub struct Bucket {
    pool: SqlitePool,
    files: String,
    segments: String,
    segment_size: usize,
}

impl Bucket {
    async fn open(db: &Database, name: &str, segment_size: usize) -> Result<Self> {
        let bucket = Self {
            pool: db.pool.clone(),
            files: format!("{}_{}_files", db.name, name),
            segments: format!("{}_{}_segments", db.name, name),
            segment_size,
        };
        bucket.create_tables().await?;
        Ok(bucket)
    }

    async fn create_tables(&self) -> Result<()> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {files} (
                id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                length INTEGER NOT NULL,
                segment_size INTEGER NOT NULL,
                upload_date TIMESTAMP NOT NULL
            )
            "#,
            files = self.files
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {segments} (
                file_id TEXT NOT NULL,
                n INTEGER NOT NULL,
                data BLOB NOT NULL,
                PRIMARY KEY (file_id, n),
                FOREIGN KEY (file_id) REFERENCES {files}(id) ON DELETE CASCADE
            )
            "#,
            segments = self.segments,
            files = self.files
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{files}_filename ON {files}(filename, upload_date)",
            files = self.files
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn files_table(&self) -> &str {
        &self.files
    }

    pub fn segments_table(&self) -> &str {
        &self.segments
    }

    /// Store `content` under `filename` as one file row plus its segments
    async fn upload(&self, id: &ObjectId, filename: &str, content: &[u8]) -> Result<()> {
        let id = id.to_hex();
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO {} (id, filename, length, segment_size, upload_date) VALUES (?1, ?2, ?3, ?4, ?5)",
            self.files
        ))
        .bind(&id)
        .bind(filename)
        .bind(content.len() as i64)
        .bind(self.segment_size as i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let insert_segment = format!(
            "INSERT INTO {} (file_id, n, data) VALUES (?1, ?2, ?3)",
            self.segments
        );
        for (n, segment) in content.chunks(self.segment_size).enumerate() {
            sqlx::query(&insert_segment)
                .bind(&id)
                .bind(n as i64)
                .bind(segment)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Look up the newest file stored under `filename`
    pub async fn find_file(&self, filename: &str) -> Result<Option<StoredFile>> {
        let row = sqlx::query(&format!(
            "SELECT id, filename, length, segment_size FROM {} WHERE filename = ?1
             ORDER BY upload_date DESC, id DESC LIMIT 1",
            self.files
        ))
        .bind(filename)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let length: i64 = row.get("length");
            let segment_size: i64 = row.get("segment_size");
            StoredFile {
                id: row.get("id"),
                filename: row.get("filename"),
                length: length as u64,
                segment_size: segment_size as usize,
            }
        }))
    }

    /// Stream the segments of `file` in order
    fn open_download_stream(&self, file: StoredFile) -> ChunkReadStream {
        let count = if file.segment_size == 0 {
            0
        } else {
            file.length.div_ceil(file.segment_size as u64)
        };
        let cursor = SegmentCursor {
            pool: self.pool.clone(),
            sql: format!(
                "SELECT data FROM {} WHERE file_id = ?1 AND n = ?2",
                self.segments
            ),
            file_id: file.id,
            filename: file.filename,
            next: 0,
            count,
        };

        let segments = futures::stream::try_unfold(cursor, |mut cursor| async move {
            if cursor.next >= cursor.count {
                return Ok(None);
            }
            let data: Option<Vec<u8>> = sqlx::query_scalar(&cursor.sql)
                .bind(&cursor.file_id)
                .bind(cursor.next as i64)
                .fetch_optional(&cursor.pool)
                .await?;
            // the file was deleted while it was being read
            let data = data.ok_or_else(|| StoreError::not_found(cursor.filename.clone()))?;
            cursor.next += 1;
            Ok::<_, StoreError>(Some((data, cursor)))
        });

        ChunkReadStream::new(file.length, file.segment_size, segments.boxed())
    }

    /// Sum the length of every stored file
    async fn total_length(&self) -> Result<u64> {
        let sql = format!("SELECT length FROM {}", self.files);
        let mut lengths = sqlx::query_scalar::<_, i64>(&sql).fetch(&self.pool);
        let mut total = 0u64;
        while let Some(length) = lengths.try_next().await? {
            total += length as u64;
        }
        Ok(total)
    }

    /// Delete a file and all of its segments
    async fn delete(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(&format!("DELETE FROM {} WHERE file_id = ?1", self.segments))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM {} WHERE id = ?1", self.files))
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

struct SegmentCursor {
    pool: SqlitePool,
    sql: String,
    file_id: String,
    filename: String,
    next: u64,
    count: u64,
}

/// Stores chunks in SQLite. See module docs for the table layout.
pub struct SqliteBackend {
    config: StoreConfig,
    connection_string: String,
    client: OnceCell<SqlitePool>,
    database: OnceCell<Database>,
    bucket: OnceCell<Bucket>,
}

impl SqliteBackend {
    /// Creates a backend. No connection is made until the first operation.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let connection_string = config.resolve_connection_string();
        Ok(Self {
            config,
            connection_string,
            client: OnceCell::new(),
            database: OnceCell::new(),
            bucket: OnceCell::new(),
        })
    }

    /// Creates a backend on a private in-memory database
    pub fn open_memory() -> Result<Self> {
        Self::new(StoreConfig::memory())
    }

    /// Establish the connection and create the tables now instead of on first use
    pub async fn connect(&self) -> Result<()> {
        self.bucket().await.map(|_| ())
    }

    /// Whether the connection pool has been created yet
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    fn is_in_memory(&self) -> bool {
        self.connection_string.contains(":memory:") || self.connection_string.contains("mode=memory")
    }

    async fn client(&self) -> Result<&SqlitePool> {
        self.client
            .get_or_try_init(|| async {
                let mut options = SqliteConnectOptions::from_str(&self.connection_string)?
                    .foreign_keys(true)
                    .busy_timeout(Duration::from_secs(5));

                let pool = if self.is_in_memory() {
                    // every connection to :memory: opens a new database, keep exactly one alive
                    SqlitePoolOptions::new()
                        .max_connections(1)
                        .min_connections(1)
                        .idle_timeout(None)
                        .max_lifetime(None)
                        .connect_with(options)
                        .await?
                } else {
                    options = options
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal);
                    SqlitePoolOptions::new().connect_with(options).await?
                };

                info!("Connected to chunk store at {}", self.connection_string);
                Ok::<_, StoreError>(pool)
            })
            .await
    }

    async fn database(&self) -> Result<&Database> {
        self.database
            .get_or_try_init(|| async {
                let pool = self.client().await?.clone();
                Ok::<_, StoreError>(Database {
                    pool,
                    name: self.config.database.clone(),
                })
            })
            .await
    }

    /// The blob bucket, created together with its tables on first use
    pub async fn bucket(&self) -> Result<&Bucket> {
        self.bucket
            .get_or_try_init(|| async {
                let db = self.database().await?;
                let bucket = Bucket::open(db, &self.config.bucket, self.config.segment_size).await?;
                info!(
                    "Opened bucket '{}' in database '{}'",
                    self.config.bucket,
                    db.name()
                );
                Ok::<_, StoreError>(bucket)
            })
            .await
    }
}

#[async_trait]
impl ChunkStoreBackend for SqliteBackend {
    async fn add_chunk(&self, content: &[u8], path: &str) -> Result<String> {
        let folder = if path.is_empty() { path::ROOT } else { path };

        let id = ObjectId::new();
        let filename = path::join(folder, &id.to_hex());

        self.bucket().await?.upload(&id, &filename, content).await?;
        debug!("Stored chunk {} ({} bytes)", filename, content.len());
        Ok(filename)
    }

    async fn get_one(&self, path: &str) -> Result<ChunkReadStream> {
        let filename = path::normalize(path);
        let bucket = self.bucket().await?;
        let file = bucket
            .find_file(&filename)
            .await?
            .ok_or_else(|| StoreError::not_found(filename.clone()))?;
        Ok(bucket.open_download_stream(file))
    }

    async fn get_size(&self) -> Result<u64> {
        self.bucket().await?.total_length().await
    }

    async fn delete_chunks(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }

        let bucket = self.bucket().await?;
        let mut deleted = Vec::new();
        for path in paths {
            let filename = path::normalize(path);
            match delete_one(bucket, &filename).await {
                Ok(true) => deleted.push(filename),
                Ok(false) => {}
                Err(e) if deleted.is_empty() => return Err(e),
                Err(e) => {
                    return Err(StoreError::PartialDelete {
                        deleted,
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Delete the newest file stored under `filename`. Returns `false` if there is none.
async fn delete_one(bucket: &Bucket, filename: &str) -> Result<bool> {
    match bucket.find_file(filename).await? {
        Some(file) => {
            bucket.delete(&file.id).await?;
            debug!("Deleted chunk {}", filename);
            Ok(true)
        }
        None => {
            debug!("Chunk {} does not exist, nothing to delete", filename);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    fn small_segments() -> StoreConfig {
        StoreConfig::memory().with_segment_size(4)
    }

    #[tokio::test]
    async fn test_add_and_read_back() -> Result<()> {
        let backend = SqliteBackend::new(small_segments())?;
        let content = b"<Building gml:id=\"b1\"/>";

        let path = backend.add_chunk(content, "/imports/berlin").await?;
        assert!(path.starts_with("/imports/berlin/"));
        assert_eq!(path.len(), "/imports/berlin/".len() + 24);

        let stream = backend.get_one(&path).await?;
        assert_eq!(stream.len(), content.len() as u64);
        assert_eq!(stream.segment_size(), 4);
        assert_eq!(stream.read_to_end().await?, content);
        Ok(())
    }

    #[tokio::test]
    async fn test_stream_yields_segments() -> Result<()> {
        let backend = SqliteBackend::new(small_segments())?;
        let path = backend.add_chunk(b"0123456789", "/").await?;

        let segments: Vec<Vec<u8>> = backend.get_one(&path).await?.map(|s| s.unwrap()).collect().await;
        assert_eq!(segments, vec![b"0123".to_vec(), b"4567".to_vec(), b"89".to_vec()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_folder_defaults_to_root() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let path = backend.add_chunk(b"x", "").await?;
        assert!(path.starts_with('/'));
        assert_eq!(path.matches('/').count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_folder_is_normalized() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let path = backend.add_chunk(b"x", "//a/./b//").await?;
        assert!(path.starts_with("/a/b/"));
        // reading through an unnormalized spelling finds the same chunk
        let id = path.rsplit('/').next().unwrap();
        let stream = backend.get_one(&format!("/a//b/./{id}")).await?;
        assert_eq!(stream.read_to_end().await?, b"x");
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_chunk() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let path = backend.add_chunk(b"", "/empty").await?;
        let stream = backend.get_one(&path).await?;
        assert!(stream.is_empty());
        assert!(stream.read_to_end().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let err = backend.get_one("/nope/000000000000000000000000").await.unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[tokio::test]
    async fn test_size_sums_all_chunks() -> Result<()> {
        let backend = SqliteBackend::new(small_segments())?;
        assert_eq!(backend.get_size().await?, 0);
        backend.add_chunk(b"hello", "/a").await?;
        backend.add_chunk(b"world!", "/b").await?;
        backend.add_chunk(b"", "/c").await?;
        assert_eq!(backend.get_size().await?, 11);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() -> Result<()> {
        let backend = SqliteBackend::new(small_segments())?;
        let keep = backend.add_chunk(b"keep me", "/a").await?;
        let gone = backend.add_chunk(b"delete me", "/a").await?;

        backend.delete_chunks(&[gone.clone()]).await?;
        backend.delete_chunks(&[gone.clone()]).await?;

        assert!(backend.get_one(&gone).await.unwrap_err().is_not_found());
        assert_eq!(backend.get_one(&keep).await?.read_to_end().await?, b"keep me");
        assert_eq!(backend.get_size().await?, 7);

        let bucket = backend.bucket().await?;
        let orphans: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE file_id NOT IN (SELECT id FROM {})",
            bucket.segments_table(),
            bucket.files_table()
        ))
        .fetch_one(bucket.pool())
        .await?;
        assert_eq!(orphans, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_skips_missing_paths() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let a = backend.add_chunk(b"a", "/x").await?;
        let b = backend.add_chunk(b"b", "/x").await?;

        backend
            .delete_chunks(&[a.clone(), "/x/missing".to_string(), b.clone()])
            .await?;
        assert_eq!(backend.get_size().await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_empty_does_not_connect() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        backend.delete_chunks(&[]).await?;
        assert!(!backend.is_connected());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_aborts_on_first_failure() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let first = backend.add_chunk(b"1", "/batch").await?;
        let second = backend.add_chunk(b"22", "/batch").await?;
        let third = backend.add_chunk(b"333", "/batch").await?;

        let bucket = backend.bucket().await?;
        sqlx::query(&format!(
            "CREATE TRIGGER refuse_delete BEFORE DELETE ON {} WHEN OLD.filename = '{}'
             BEGIN SELECT RAISE(ABORT, 'refused'); END",
            bucket.files_table(),
            second
        ))
        .execute(bucket.pool())
        .await?;

        let err = backend
            .delete_chunks(&[first.clone(), second.clone(), third.clone()])
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.deleted_paths(), [first.clone()]);

        // the first deletion stands, the failed one is rolled back, the rest never ran
        assert!(backend.get_one(&first).await.unwrap_err().is_not_found());
        assert_eq!(backend.get_one(&second).await?.read_to_end().await?, b"22");
        assert_eq!(backend.get_one(&third).await?.read_to_end().await?, b"333");
        Ok(())
    }

    #[tokio::test]
    async fn test_failure_on_first_path_is_not_partial() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let only = backend.add_chunk(b"1", "/batch").await?;

        let bucket = backend.bucket().await?;
        sqlx::query(&format!(
            "CREATE TRIGGER refuse_delete BEFORE DELETE ON {}
             BEGIN SELECT RAISE(ABORT, 'refused'); END",
            bucket.files_table()
        ))
        .execute(bucket.pool())
        .await?;

        let err = backend.delete_chunks(&[only]).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend { .. }));
        assert!(err.deleted_paths().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_adds_get_distinct_paths() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let (a, b) = tokio::join!(
            backend.add_chunk(b"a", "/same"),
            backend.add_chunk(b"b", "/same")
        );
        let (a, b) = (a?, b?);
        assert_ne!(a, b);
        assert_eq!(backend.get_one(&a).await?.read_to_end().await?, b"a");
        assert_eq!(backend.get_one(&b).await?.read_to_end().await?, b"b");
        Ok(())
    }

    #[tokio::test]
    async fn test_handles_are_created_once() -> Result<()> {
        let backend = SqliteBackend::open_memory()?;
        let (a, b) = tokio::join!(backend.bucket(), backend.bucket());
        assert!(std::ptr::eq(a?, b?));
        assert!(backend.is_connected());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_database_persists() -> Result<()> {
        let temp_dir = tempdir()?;
        let cs = format!("sqlite://{}/chunks.db?mode=rwc", temp_dir.path().display());

        let path = {
            let backend = SqliteBackend::new(StoreConfig::default().with_connection_string(&cs))?;
            backend.add_chunk(b"persistent", "/disk").await?
        };

        let backend = SqliteBackend::new(StoreConfig::default().with_connection_string(&cs))?;
        assert_eq!(backend.get_one(&path).await?.read_to_end().await?, b"persistent");
        assert_eq!(backend.get_size().await?, 10);
        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_database_is_backend_error() -> Result<()> {
        let temp_dir = tempdir()?;
        let cs = format!(
            "sqlite://{}/missing/dir/chunks.db?mode=ro",
            temp_dir.path().display()
        );
        let backend = SqliteBackend::new(StoreConfig::default().with_connection_string(cs))?;
        let err = backend.get_size().await.unwrap_err();
        assert!(err.is_transient());
        Ok(())
    }
}
