use std::fmt;

use serde::{Deserialize, Serialize};

/// Metadata service that produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetadataSource {
    /// The Movie Database, the primary provider.
    Tmdb,
    /// Open Movie Database, the secondary provider.
    Omdb,
}

/// Provider specific identifier.
///
/// TMDB uses integer ids and OMDb uses IMDb id strings like "tt0133093".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataId {
    Numeric(u64),
    Text(String),
}

/// Canonical title information for one filename stem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub source: MetadataSource,
    pub id: MetadataId,
    pub title: String,
    pub year: Option<String>,
}

impl MetadataSource {
    /// Short tag used in directory names.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Tmdb => "tmdb",
            Self::Omdb => "omdb",
        }
    }
}

impl MetadataRecord {
    /// Source tag used in directory names, e.g. "[tmdbid-603]".
    #[must_use]
    pub fn source_tag(&self) -> String {
        format!("[{}id-{}]", self.source, self.id)
    }
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl fmt::Display for MetadataId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(id) => write!(f, "{id}"),
            Self::Text(id) => write!(f, "{id}"),
        }
    }
}

impl From<u64> for MetadataId {
    fn from(id: u64) -> Self {
        Self::Numeric(id)
    }
}

impl From<&str> for MetadataId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_string())
    }
}

impl fmt::Display for MetadataRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.title, self.source_tag())?;
        if let Some(year) = &self.year {
            write!(f, " ({year})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod metadata_record_tests {
    use super::*;

    #[test]
    fn source_tag_formats_numeric_and_text_ids() {
        let tmdb = MetadataRecord {
            source: MetadataSource::Tmdb,
            id: 603.into(),
            title: "The_Matrix".to_string(),
            year: Some("1999".to_string()),
        };
        assert_eq!(tmdb.source_tag(), "[tmdbid-603]");

        let omdb = MetadataRecord {
            source: MetadataSource::Omdb,
            id: "tt0133093".into(),
            title: "The_Matrix".to_string(),
            year: None,
        };
        assert_eq!(omdb.source_tag(), "[omdbid-tt0133093]");
    }

    #[test]
    fn serializes_to_cache_format() {
        let record = MetadataRecord {
            source: MetadataSource::Tmdb,
            id: 603.into(),
            title: "The_Matrix".to_string(),
            year: None,
        };
        let json = serde_json::to_value(&record).expect("should serialize");
        assert_eq!(
            json,
            serde_json::json!({"source": "tmdb", "id": 603, "title": "The_Matrix", "year": null})
        );
    }

    #[test]
    fn deserializes_both_id_shapes() {
        let numeric: MetadataRecord =
            serde_json::from_str(r#"{"source": "tmdb", "id": 1, "title": "A", "year": "2020"}"#)
                .expect("should parse numeric id");
        assert_eq!(numeric.id, MetadataId::Numeric(1));

        let text: MetadataRecord =
            serde_json::from_str(r#"{"source": "omdb", "id": "tt1", "title": "A", "year": null}"#)
                .expect("should parse text id");
        assert_eq!(text.id, MetadataId::Text("tt1".to_string()));
        assert_eq!(text.year, None);
    }
}
