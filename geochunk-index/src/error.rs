//! Error types for indexer factories

use std::num::ParseFloatError;

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The search term is not in the format the indexer understands
    #[error("Cannot parse search term '{term}': {message}")]
    Parse { term: String, message: String },

    /// A coordinate that is not a valid number
    #[error("Invalid coordinate in search term '{term}': {source}")]
    Coordinate {
        term: String,
        #[source]
        source: ParseFloatError,
    },

    /// No indexer is registered under this name
    #[error("Unknown indexer: {name}")]
    UnknownIndexer { name: String },
}

impl IndexError {
    pub fn parse<T: Into<String>, M: Into<String>>(term: T, message: M) -> Self {
        Self::Parse {
            term: term.into(),
            message: message.into(),
        }
    }

    /// Whether the error was caused by a malformed search term
    pub fn is_parse_error(&self) -> bool {
        matches!(self, IndexError::Parse { .. } | IndexError::Coordinate { .. })
    }
}
