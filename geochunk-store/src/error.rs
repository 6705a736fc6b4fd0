//! Error types for the chunk store

/// Result type for chunk store operations.
///
/// This is a convenience type alias that uses [`StoreError`] as the error type.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for all chunk store operations.
///
/// The variants follow the failure classes a caller has to tell apart:
///
/// - **Missing data**: a read targeted a path that holds no chunk
/// - **Backend failures**: connectivity or protocol errors from the storage engine
/// - **Configuration errors**: settings that cannot be turned into a backend
/// - **IO errors**: local file system access, mostly from the CLI and config loading
///
/// Only backend and IO failures are considered transient, see [`StoreError::is_transient`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No chunk is stored under the requested path
    #[error("Chunk not found: {path}")]
    NotFound { path: String },

    /// Connectivity or protocol failure reported by the storage backend
    #[error("Storage backend error: {source}")]
    Backend {
        #[from]
        source: sqlx::Error,
    },

    /// Configuration that cannot be used to build a backend
    #[error("Invalid store configuration: {message}")]
    InvalidConfig { message: String },

    /// A string that is not a valid 24 character object id
    #[error("Invalid object id: {value}")]
    InvalidId { value: String },

    /// A batch delete stopped early; `deleted` lists the chunks it removed before the failure
    #[error("Deleted {} chunks before failing: {source}", .deleted.len())]
    PartialDelete {
        deleted: Vec<String>,
        #[source]
        source: Box<StoreError>,
    },

    /// IO errors
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create a not-found error for the given path.
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation may succeed.
    ///
    /// Backend and IO failures may go away on their own; a missing chunk or a
    /// broken configuration will not.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Backend { .. } | StoreError::Io { .. } => true,
            StoreError::PartialDelete { source, .. } => source.is_transient(),
            _ => false,
        }
    }

    /// Paths a failed batch delete removed before it stopped
    pub fn deleted_paths(&self) -> &[String] {
        match self {
            StoreError::PartialDelete { deleted, .. } => deleted,
            _ => &[],
        }
    }

    /// Check if this error reports a missing chunk
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(!StoreError::not_found("/a/b").is_transient());
        assert!(StoreError::not_found("/a/b").is_not_found());
        assert!(!StoreError::invalid_config("bad").is_transient());
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::from(std::io::Error::other("disk")).is_transient());
    }

    #[test]
    fn test_partial_delete_follows_its_cause() {
        let err = StoreError::PartialDelete {
            deleted: vec!["/a/1".to_string()],
            source: Box::new(StoreError::from(sqlx::Error::PoolTimedOut)),
        };
        assert!(err.is_transient());
        assert_eq!(err.deleted_paths(), ["/a/1".to_string()]);
        assert!(err.to_string().starts_with("Deleted 1 chunks before failing"));

        let err = StoreError::PartialDelete {
            deleted: vec!["/a/1".to_string()],
            source: Box::new(StoreError::invalid_config("bad")),
        };
        assert!(!err.is_transient());
        assert!(StoreError::not_found("/a").deleted_paths().is_empty());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            StoreError::not_found("/imports/abc").to_string(),
            "Chunk not found: /imports/abc"
        );
        assert_eq!(
            StoreError::invalid_config("missing database").to_string(),
            "Invalid store configuration: missing database"
        );
    }
}
