//! Registry of installed indexer factories and the query planner on top.
//!
//! The registry is built from an explicit list of indexer names, so adding a
//! new indexer means implementing [`IndexerFactory`] and registering it in
//! [`IndexerRegistry::factory_for_name`].

use crate::bbox::BoundingBoxIndexerFactory;
use crate::error::{IndexError, Result};
use crate::factory::{IndexerFactory, MatchPriority};
use crate::query::{bool_should, match_none};
use crate::tag::TagIndexerFactory;
use serde_json::{Value, json};
use std::sync::Arc;

/// Names of the indexers installed by [`IndexerRegistry::default`]
pub const DEFAULT_INDEXERS: &[&str] = &["bbox", "tags"];

/// Ordered collection of indexer factories
#[derive(Clone)]
pub struct IndexerRegistry {
    factories: Vec<Arc<dyn IndexerFactory>>,
}

impl IndexerRegistry {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Build a registry from indexer names, in the given order
    pub fn from_names<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(Self::factory_for_name(name.as_ref())?);
        }
        Ok(registry)
    }

    /// The built-in factory with the given name
    pub fn factory_for_name(name: &str) -> Result<Arc<dyn IndexerFactory>> {
        match name {
            "bbox" => Ok(Arc::new(BoundingBoxIndexerFactory::new())),
            "tags" => Ok(Arc::new(TagIndexerFactory::new())),
            _ => Err(IndexError::UnknownIndexer {
                name: name.to_string(),
            }),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn IndexerFactory>) {
        self.factories.push(factory);
    }

    pub fn factories(&self) -> &[Arc<dyn IndexerFactory>] {
        &self.factories
    }

    /// The index schema: the mappings of all factories merged into one.
    ///
    /// Objects are merged recursively, so two factories may contribute
    /// settings to the same field. For conflicting scalar values the factory
    /// registered last wins.
    pub fn mapping(&self) -> Value {
        let mut mapping = json!({ "properties": {} });
        for factory in &self.factories {
            merge(&mut mapping, factory.mapping());
        }
        mapping
    }

    /// The priority every factory assigns to `term`, in registration order
    pub fn priorities(&self, term: &str) -> Vec<(&str, MatchPriority)> {
        self.factories
            .iter()
            .map(|f| (f.name(), f.query_priority(term)))
            .collect()
    }

    /// Compile a free-text search term into one query document.
    ///
    /// If a factory claims the term with [`MatchPriority::Only`], its query is
    /// used alone (the first such factory wins). Otherwise the queries of all
    /// factories reporting [`MatchPriority::Some`] are combined so that any of
    /// them may match. A term no factory recognizes matches nothing.
    pub fn compile(&self, term: &str) -> Result<Value> {
        let mut candidates = Vec::new();
        for factory in &self.factories {
            match factory.query_priority(term) {
                MatchPriority::Only => return factory.compile_query(term),
                MatchPriority::Some => candidates.push(factory),
                MatchPriority::None => {}
            }
        }

        match candidates.len() {
            0 => Ok(match_none()),
            1 => candidates[0].compile_query(term),
            _ => {
                let queries = candidates
                    .iter()
                    .map(|f| f.compile_query(term))
                    .collect::<Result<Vec<_>>>()?;
                Ok(bool_should(queries))
            }
        }
    }
}

impl Default for IndexerRegistry {
    fn default() -> Self {
        Self {
            factories: vec![
                Arc::new(BoundingBoxIndexerFactory::new()),
                Arc::new(TagIndexerFactory::new()),
            ],
        }
    }
}

/// Deep-merge `source` into `target`
fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}

impl std::fmt::Debug for IndexerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.factories.iter().map(|factory| factory.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::term_query;

    /// Claims every term that starts with `id:`
    struct IdIndexerFactory;

    impl IndexerFactory for IdIndexerFactory {
        fn name(&self) -> &str {
            "id"
        }

        fn mapping(&self) -> Value {
            json!({"properties": {"gmlIds": {"type": "keyword"}}})
        }

        fn query_priority(&self, term: &str) -> MatchPriority {
            if term.starts_with("id:") {
                MatchPriority::Only
            } else {
                MatchPriority::Some
            }
        }

        fn compile_query(&self, term: &str) -> Result<Value> {
            Ok(term_query("gmlIds", term.trim_start_matches("id:")))
        }
    }

    /// Adds a sub-field to the `tags` field of [`TagIndexerFactory`]
    struct TagTextFactory;

    impl IndexerFactory for TagTextFactory {
        fn name(&self) -> &str {
            "tag-text"
        }

        fn mapping(&self) -> Value {
            json!({"properties": {"tags": {"fields": {"text": {"type": "text"}}}}})
        }

        fn query_priority(&self, _term: &str) -> MatchPriority {
            MatchPriority::None
        }

        fn compile_query(&self, _term: &str) -> Result<Value> {
            Ok(match_none())
        }
    }

    #[test]
    fn test_default_registry() {
        let registry = IndexerRegistry::default();
        let names: Vec<&str> = registry.factories().iter().map(|f| f.name()).collect();
        assert_eq!(names, DEFAULT_INDEXERS);
        assert_eq!(
            registry.mapping(),
            IndexerRegistry::from_names(DEFAULT_INDEXERS).unwrap().mapping()
        );
    }

    #[test]
    fn test_mapping_merges_shared_fields() {
        let mut registry = IndexerRegistry::from_names(["tags"]).unwrap();
        registry.register(Arc::new(TagTextFactory));
        assert_eq!(
            registry.mapping(),
            json!({
                "properties": {
                    "tags": {
                        "type": "keyword",
                        "fields": {"text": {"type": "text"}}
                    }
                }
            })
        );
    }

    #[test]
    fn test_merge_overwrites_scalars() {
        let mut target = json!({"a": {"type": "keyword", "keep": true}});
        merge(&mut target, json!({"a": {"type": "text"}, "b": 1}));
        assert_eq!(target, json!({"a": {"type": "text", "keep": true}, "b": 1}));
    }

    #[test]
    fn test_from_names_rejects_unknown() {
        let err = IndexerRegistry::from_names(["bbox", "gmlid"]).unwrap_err();
        assert!(matches!(err, IndexError::UnknownIndexer { ref name } if name == "gmlid"));
        assert_eq!(IndexerRegistry::from_names(["tags"]).unwrap().factories().len(), 1);
    }

    #[test]
    fn test_merged_mapping() {
        let mut registry = IndexerRegistry::default();
        registry.register(Arc::new(IdIndexerFactory));
        assert_eq!(
            registry.mapping(),
            json!({
                "properties": {
                    "bbox": {"type": "geo_shape", "tree": "quadtree", "precision": "29"},
                    "tags": {"type": "keyword"},
                    "gmlIds": {"type": "keyword"}
                }
            })
        );
    }

    #[test]
    fn test_only_wins_over_some() {
        let registry = IndexerRegistry::default();
        let query = registry.compile("10,20,30,40").unwrap();
        assert!(query.get("geo_shape").is_some());
        assert_eq!(
            registry.priorities("10,20,30,40"),
            vec![("bbox", MatchPriority::Only), ("tags", MatchPriority::Some)]
        );
    }

    #[test]
    fn test_single_some_is_used_directly() {
        let registry = IndexerRegistry::default();
        assert_eq!(
            registry.compile("buildings").unwrap(),
            json!({"term": {"tags": "buildings"}})
        );
    }

    #[test]
    fn test_some_queries_are_combined() {
        let mut registry = IndexerRegistry::default();
        registry.register(Arc::new(IdIndexerFactory));
        let query = registry.compile("b1").unwrap();
        assert_eq!(
            query,
            json!({
                "bool": {
                    "should": [
                        {"term": {"tags": "b1"}},
                        {"term": {"gmlIds": "b1"}}
                    ],
                    "minimum_should_match": 1
                }
            })
        );

        assert_eq!(
            registry.compile("id:b1").unwrap(),
            json!({"term": {"gmlIds": "b1"}})
        );
    }

    #[test]
    fn test_unrecognized_term_matches_nothing() {
        assert_eq!(IndexerRegistry::default().compile("  ").unwrap(), match_none());
        assert_eq!(IndexerRegistry::new().compile("x").unwrap(), match_none());
    }
}
