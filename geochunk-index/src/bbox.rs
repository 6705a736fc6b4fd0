//! Indexer factory for bounding boxes
//!
//! Recognizes search terms of the form `minX,minY,maxX,maxY` and compiles them
//! into geo-shape queries against the `bbox` field.
//!
//! ```
//! use geochunk_index::{BoundingBoxIndexerFactory, IndexerFactory, MatchPriority};
//!
//! let factory = BoundingBoxIndexerFactory::new();
//! assert_eq!(factory.query_priority("13.3, 52.4, 13.5, 52.6"), MatchPriority::Only);
//! assert_eq!(factory.query_priority("Berlin"), MatchPriority::None);
//!
//! let query = factory.compile_query("10,20,30,40").unwrap();
//! assert_eq!(
//!     query["geo_shape"]["bbox"]["shape"]["coordinates"],
//!     serde_json::json!([[10.0, 40.0], [30.0, 20.0]])
//! );
//! ```

use crate::error::{IndexError, Result};
use crate::factory::{IndexerFactory, MatchPriority};
use crate::query::{geo_shape_query, shape};
use itertools::Itertools;
use regex::Regex;
use serde_json::{Value, json};
use std::sync::LazyLock;

/// Name of the index field holding the bounding box
pub const BBOX_FIELD: &str = "bbox";

const FLOAT_REGEX: &str = r"[-+]?[0-9]*\.?[0-9]+([eE][-+]?[0-9]+)?";
const COMMA_REGEX: &str = r"\s*,\s*";

static BBOX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let bbox = [FLOAT_REGEX; 4].join(COMMA_REGEX);
    Regex::new(&format!("^{bbox}$")).expect("bounding box pattern is valid")
});

static FLOAT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{FLOAT_REGEX}$")).expect("float pattern is valid"));

/// Axis-aligned rectangle given by its minimum and maximum coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Parse `minX,minY,maxX,maxY`.
    ///
    /// Coordinates must be plain decimal numbers; `inf`, `NaN` and forms like
    /// `1.` are rejected even though `f64` would accept them.
    pub fn parse(term: &str) -> Result<Self> {
        let (min_x, min_y, max_x, max_y) = term
            .split(',')
            .map(|c| {
                let c = c.trim();
                let value = c.parse::<f64>().map_err(|source| IndexError::Coordinate {
                    term: term.to_string(),
                    source,
                })?;
                if !FLOAT_PATTERN.is_match(c) {
                    return Err(IndexError::parse(
                        term,
                        format!("'{c}' is not a decimal number"),
                    ));
                }
                Ok(value)
            })
            .collect_tuple()
            .ok_or_else(|| IndexError::parse(term, "expected exactly four coordinates"))?;
        Ok(Self {
            min_x: min_x?,
            min_y: min_y?,
            max_x: max_x?,
            max_y: max_y?,
        })
    }

    /// Envelope coordinates: top-left corner first, then bottom-right
    pub fn envelope(&self) -> Value {
        json!([[self.min_x, self.max_y], [self.max_x, self.min_y]])
    }
}

/// Factory for indexers that manage bounding boxes
#[derive(Debug, Clone, Default)]
pub struct BoundingBoxIndexerFactory;

impl BoundingBoxIndexerFactory {
    pub fn new() -> Self {
        Self
    }
}

impl IndexerFactory for BoundingBoxIndexerFactory {
    fn name(&self) -> &str {
        "bbox"
    }

    fn mapping(&self) -> Value {
        // 29 is the deepest quadtree level the search engine supports
        json!({
            "properties": {
                BBOX_FIELD: {
                    "type": "geo_shape",
                    "tree": "quadtree",
                    "precision": "29"
                }
            }
        })
    }

    fn query_priority(&self, term: &str) -> MatchPriority {
        if BBOX_PATTERN.is_match(term) {
            MatchPriority::Only
        } else {
            MatchPriority::None
        }
    }

    fn compile_query(&self, term: &str) -> Result<Value> {
        let bbox = BoundingBox::parse(term)?;
        Ok(geo_shape_query(
            BBOX_FIELD,
            shape("envelope", bbox.envelope()),
            "intersects",
        ))
    }
}
