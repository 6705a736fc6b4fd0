//! The extension point for indexers.
//!
//! Every [`IndexerFactory`] owns a part of the search index: it declares the
//! fields it needs ([`IndexerFactory::mapping`]), says whether it understands a
//! free-text search term ([`IndexerFactory::query_priority`]) and turns such a
//! term into a query document ([`IndexerFactory::compile_query`]).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How confidently an indexer recognizes a search term
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchPriority {
    /// The term is not meant for this indexer
    #[default]
    None,
    /// The indexer can handle the term, possibly together with others
    Some,
    /// The term belongs to this indexer and to no other
    Only,
}

impl MatchPriority {
    pub fn matches(&self) -> bool {
        !matches!(self, MatchPriority::None)
    }
}

impl std::fmt::Display for MatchPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPriority::None => write!(f, "NONE"),
            MatchPriority::Some => write!(f, "SOME"),
            MatchPriority::Only => write!(f, "ONLY"),
        }
    }
}

impl std::str::FromStr for MatchPriority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(MatchPriority::None),
            "some" => Ok(MatchPriority::Some),
            "only" => Ok(MatchPriority::Only),
            _ => Err(format!(
                "Invalid match priority: '{s}'. Valid values are: none, some, only"
            )),
        }
    }
}

/// Contributes index schema and query compilation for one capability.
///
/// Implementations are stateless; all methods are pure functions of their
/// input.
pub trait IndexerFactory: Send + Sync {
    /// Name used to select this indexer in configuration
    fn name(&self) -> &str;

    /// The part of the index schema this indexer owns
    fn mapping(&self) -> Value;

    /// Classify whether this indexer recognizes `term`
    fn query_priority(&self, term: &str) -> MatchPriority;

    /// Compile `term` into a query document.
    ///
    /// Only call this for terms [`query_priority`](Self::query_priority)
    /// reported as [`MatchPriority::Some`] or [`MatchPriority::Only`].
    fn compile_query(&self, term: &str) -> Result<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(MatchPriority::Only > MatchPriority::Some);
        assert!(MatchPriority::Some > MatchPriority::None);
        assert!(!MatchPriority::None.matches());
        assert!(MatchPriority::Some.matches());
        assert_eq!(MatchPriority::default(), MatchPriority::None);
    }

    #[test]
    fn test_priority_from_str_and_display() {
        assert_eq!("ONLY".parse::<MatchPriority>().unwrap(), MatchPriority::Only);
        assert_eq!("some".parse::<MatchPriority>().unwrap(), MatchPriority::Some);
        assert!("maybe".parse::<MatchPriority>().is_err());
        assert_eq!(MatchPriority::None.to_string(), "NONE");
        assert_eq!(
            serde_json::to_value(MatchPriority::Only).unwrap(),
            serde_json::json!("ONLY")
        );
    }
}
