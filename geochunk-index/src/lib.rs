//! geochunk-index: Pluggable indexers for geochunk
//!
//! Indexers declare the index schema they need and compile free-text search
//! terms into structured query documents for the search engine.
//!
//! - [`IndexerFactory`] is the extension point, [`MatchPriority`] its answer to
//!   "is this term for you?"
//! - [`BoundingBoxIndexerFactory`] handles `minX,minY,maxX,maxY` terms
//! - [`TagIndexerFactory`] matches terms against import tags
//! - [`IndexerRegistry`] holds the installed factories and plans queries

pub mod bbox;
pub mod error;
pub mod factory;
pub mod query;
pub mod registry;
pub mod tag;

pub use bbox::{BoundingBox, BoundingBoxIndexerFactory};
pub use error::{IndexError, Result};
pub use factory::{IndexerFactory, MatchPriority};
pub use registry::IndexerRegistry;
pub use tag::TagIndexerFactory;
