//! Configuration for the chunk store
//!
//! ```toml
//! connection_string = "sqlite://data/geochunk.db?mode=rwc"
//! database = "geochunk"
//! bucket = "fs"
//! segment_size = 261120
//! retries = 5
//! retry_interval_ms = 1000
//! ```

use crate::error::{Result, StoreError};
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default segment size: 255 KiB
pub const DEFAULT_SEGMENT_SIZE: usize = 255 * 1024;

/// Configuration for [`SqliteBackend`](crate::storage::sqlite_store::SqliteBackend)
/// and [`IndexedStore`](crate::storage::indexed::IndexedStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx connection string, e.g. `sqlite://data/geochunk.db?mode=rwc` or `sqlite::memory:`
    pub connection_string: Option<String>,
    /// Directory holding `<database>.db`. Deprecated in favour of `connection_string`.
    pub data_dir: Option<PathBuf>,
    /// Name of the database; prefixes all table names
    pub database: String,
    /// Name of the blob bucket inside the database
    pub bucket: String,
    /// Size of the segments a chunk is split into
    pub segment_size: usize,
    /// Retries for failed backend calls
    pub retries: u32,
    /// Delay between retries in milliseconds
    pub retry_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            data_dir: None,
            database: "geochunk".to_string(),
            bucket: "fs".to_string(),
            segment_size: DEFAULT_SEGMENT_SIZE,
            retries: 5,
            retry_interval_ms: 1000,
        }
    }
}

impl StoreConfig {
    /// Configuration for a private in-memory database
    pub fn memory() -> Self {
        Self {
            connection_string: Some("sqlite::memory:".to_string()),
            ..Self::default()
        }
    }

    pub fn with_connection_string(mut self, connection_string: impl Into<String>) -> Self {
        self.connection_string = Some(connection_string.into());
        self
    }

    pub fn with_segment_size(mut self, segment_size: usize) -> Self {
        self.segment_size = segment_size;
        self
    }

    pub fn with_retries(mut self, retries: u32, interval: Duration) -> Self {
        self.retries = retries;
        self.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Parse a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)
            .map_err(|e| StoreError::invalid_config(format!("cannot parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Check names and sizes
    pub fn validate(&self) -> Result<()> {
        for (what, name) in [("database", &self.database), ("bucket", &self.bucket)] {
            if !is_identifier(name) {
                return Err(StoreError::invalid_config(format!(
                    "{what} name '{name}' must match [A-Za-z_][A-Za-z0-9_]*"
                )));
            }
        }
        if self.segment_size == 0 {
            return Err(StoreError::invalid_config("segment_size must be positive"));
        }
        Ok(())
    }

    /// The connection string to use, falling back to the deprecated `data_dir`
    pub fn resolve_connection_string(&self) -> String {
        if let Some(cs) = &self.connection_string {
            return cs.clone();
        }
        let dir = match &self.data_dir {
            Some(dir) => {
                tracing::warn!(
                    "Deprecation warning: 'data_dir' is deprecated. Use 'connection_string' instead."
                );
                dir.clone()
            }
            None => PathBuf::from("."),
        };
        format!(
            "sqlite://{}/{}.db?mode=rwc",
            dir.display(),
            self.database
        )
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retries, Duration::from_millis(self.retry_interval_ms))
            .with_logging(true)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
