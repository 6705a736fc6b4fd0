//! Builders for search engine query documents

use serde_json::{Value, json};

/// A geo-shape query matching documents whose `field` relates to `shape`
pub fn geo_shape_query(field: &str, shape: Value, relation: &str) -> Value {
    json!({
        "geo_shape": {
            field: {
                "shape": shape,
                "relation": relation
            }
        }
    })
}

/// A shape of the given type, e.g. `envelope`
pub fn shape(kind: &str, coordinates: Value) -> Value {
    json!({
        "type": kind,
        "coordinates": coordinates
    })
}

/// Exact match of `value` in `field`
pub fn term_query(field: &str, value: &str) -> Value {
    json!({ "term": { field: value } })
}

/// Matches documents matching at least one of `queries`
pub fn bool_should(queries: Vec<Value>) -> Value {
    json!({
        "bool": {
            "should": queries,
            "minimum_should_match": 1
        }
    })
}

/// Matches nothing
pub fn match_none() -> Value {
    json!({ "match_none": {} })
}
