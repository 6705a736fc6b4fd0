//! Provenance metadata attached to every chunk of an import.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata affecting the way a chunk is indexed.
///
/// One `IndexMeta` is built per import and shared (as `Arc<IndexMeta>`) by
/// every chunk that import produces. It is never modified after the first
/// chunk has been added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMeta {
    /// Identifies the import this chunk belongs to
    pub import_id: String,
    /// Name of the source file the chunk was extracted from
    pub from_file: String,
    #[serde(rename = "importTimeStamp")]
    pub import_timestamp: DateTime<Utc>,
    /// Tags to attach to the chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    /// CRS used to index the chunk if it does not specify one itself
    #[serde(
        default,
        rename = "fallbackCRSString",
        skip_serializing_if = "Option::is_none"
    )]
    pub fallback_crs: Option<String>,
}

impl IndexMeta {
    pub fn new(
        import_id: impl Into<String>,
        from_file: impl Into<String>,
        import_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            import_id: import_id.into(),
            from_file: from_file.into(),
            import_timestamp,
            tags: None,
            fallback_crs: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_fallback_crs(mut self, crs: impl Into<String>) -> Self {
        self.fallback_crs = Some(crs.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> IndexMeta {
        IndexMeta::new(
            "import-1",
            "berlin.gml",
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_minimal_serialization_omits_optionals() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["importId"], "import-1");
        assert_eq!(json["fromFile"], "berlin.gml");
        assert_eq!(json["importTimeStamp"], "2024-05-01T12:00:00Z");
        assert!(json.get("tags").is_none());
        assert!(json.get("fallbackCRSString").is_none());
    }

    #[test]
    fn test_full_serialization() {
        let meta = sample()
            .with_tags(["buildings", "lod2"])
            .with_fallback_crs("EPSG:25833");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["tags"], serde_json::json!(["buildings", "lod2"]));
        assert_eq!(json["fallbackCRSString"], "EPSG:25833");

        let back: IndexMeta = serde_json::from_value(json).unwrap();
        assert_eq!(back, meta);
    }
}
