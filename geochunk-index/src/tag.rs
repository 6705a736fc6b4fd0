//! Indexer factory for chunk tags

use crate::error::Result;
use crate::factory::{IndexerFactory, MatchPriority};
use crate::query::term_query;
use serde_json::{Value, json};

/// Name of the index field holding the tags of a chunk
pub const TAGS_FIELD: &str = "tags";

/// Matches any search term against the tags attached at import time.
///
/// Any term could be a tag, so this factory never claims a term exclusively.
#[derive(Debug, Clone, Default)]
pub struct TagIndexerFactory;

impl TagIndexerFactory {
    pub fn new() -> Self {
        Self
    }
}

impl IndexerFactory for TagIndexerFactory {
    fn name(&self) -> &str {
        "tags"
    }

    fn mapping(&self) -> Value {
        json!({
            "properties": {
                TAGS_FIELD: {
                    "type": "keyword"
                }
            }
        })
    }

    fn query_priority(&self, term: &str) -> MatchPriority {
        if term.trim().is_empty() {
            MatchPriority::None
        } else {
            MatchPriority::Some
        }
    }

    fn compile_query(&self, term: &str) -> Result<Value> {
        Ok(term_query(TAGS_FIELD, term.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_priority() {
        let factory = TagIndexerFactory::new();
        assert_eq!(factory.query_priority("roads"), MatchPriority::Some);
        assert_eq!(factory.query_priority("1,2,3,4"), MatchPriority::Some);
        assert_eq!(factory.query_priority("   "), MatchPriority::None);
    }

    #[test]
    fn test_tag_query() {
        let query = TagIndexerFactory::new().compile_query(" roads ").unwrap();
        assert_eq!(query, json!({"term": {"tags": "roads"}}));
    }
}
