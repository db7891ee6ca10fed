//! Requirement tree and index chunk types
//!
//! The serialized form of [`StructuredDocument`] is the hand-off format to
//! any index-building step, so field names here are fixed.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;

use crate::errors::{RagError, Result};

/// Chunk type for a top-level requirement
pub const REQUIREMENT_TYPE: &str = "requirement";

/// Chunk type for a dotted sub-requirement
pub const SUBREQUIREMENT_TYPE: &str = "subrequirement";

/// Version recorded when none can be found in the text
pub const UNKNOWN_VERSION: &str = "Unknown";

/// Top-level numbered clause of the standard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "requirement")]
pub struct Requirement {
    pub number: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub subrequirements: Vec<Subrequirement>,
}

/// Dotted clause nested under exactly one requirement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "subrequirement")]
pub struct Subrequirement {
    pub number: String,
    pub title: String,
    pub content: String,
    /// Back-reference to the owning requirement, rebuilt on load
    #[serde(skip)]
    pub parent_number: String,
}

impl Requirement {
    pub fn new(number: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            number: number.into(),
            title: title.into(),
            content: String::new(),
            subrequirements: Vec::new(),
        }
    }

    /// Whether this requirement carries nothing beyond its header
    pub fn is_empty(&self) -> bool {
        self.content.is_empty() && self.subrequirements.is_empty()
    }
}

impl Subrequirement {
    pub fn new(
        number: impl Into<String>,
        title: impl Into<String>,
        parent_number: impl Into<String>,
    ) -> Self {
        Self {
            number: number.into(),
            title: title.into(),
            content: String::new(),
            parent_number: parent_number.into(),
        }
    }
}

/// Leading dot-segment of a clause number ("3.2.1" -> "3")
pub fn leading_segment(number: &str) -> &str {
    number.split('.').next().unwrap_or(number)
}

/// Document-level metadata block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(rename = "type")]
    pub doc_type: String,
    pub version: String,
    /// Written as RFC 3339; timestamps without an offset are read as UTC
    #[serde(deserialize_with = "deserialize_processed_date")]
    pub processed_date: DateTime<Utc>,
}

fn deserialize_processed_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_processed_date(&raw).map_err(serde::de::Error::custom)
}

fn parse_processed_date(raw: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("invalid processed_date {:?}: {}", raw, e))
}

/// The structured form of one standard document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub document_name: String,
    pub metadata: DocumentMetadata,
    pub requirements: Vec<Requirement>,
}

impl StructuredDocument {
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.metadata.processed_date
    }

    pub fn subrequirement_count(&self) -> usize {
        self.requirements
            .iter()
            .map(|r| r.subrequirements.len())
            .sum()
    }

    /// Number of chunks `flatten` produces for this document
    pub fn chunk_count(&self) -> usize {
        self.requirements.len() + self.subrequirement_count()
    }

    /// Write pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load a document written by [`write_json`](Self::write_json)
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(RagError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut document: StructuredDocument = serde_json::from_str(json)?;
        document.relink();
        Ok(document)
    }

    /// Restore sub-requirement parent links after deserialization
    fn relink(&mut self) {
        for requirement in &mut self.requirements {
            for sub in &mut requirement.subrequirements {
                sub.parent_number = requirement.number.clone();
            }
        }
    }
}

/// Per-chunk metadata shared with the index
///
/// `number` and `parent_requirement` must be filterable on the index side.
/// `page` and `section` are never written by this crate but are honoured
/// when an index carries them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "type")]
    pub chunk_type: String,
    pub number: String,
    pub title: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_requirement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl ChunkMetadata {
    /// Value of a filterable field, as the index compares it
    pub fn field(&self, name: &str) -> Option<String> {
        match name {
            "type" => Some(self.chunk_type.clone()),
            "number" => Some(self.number.clone()),
            "title" => Some(self.title.clone()),
            "version" => Some(self.version.clone()),
            "parent_requirement" => self.parent_requirement.clone(),
            "page" => self.page.map(|p| p.to_string()),
            "section" => self.section.clone(),
            _ => None,
        }
    }
}

/// One text + metadata unit submitted to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_document() -> StructuredDocument {
        let mut requirement = Requirement::new("3", "Protect stored data");
        requirement.content = "Keep it safe".to_string();
        requirement
            .subrequirements
            .push(Subrequirement::new("3.1", "Keep data to a minimum", "3"));

        StructuredDocument {
            document_name: "standard.txt".to_string(),
            metadata: DocumentMetadata {
                doc_type: "PCI DSS Standard".to_string(),
                version: "3.2.1".to_string(),
                processed_date: Utc::now(),
            },
            requirements: vec![requirement],
        }
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample_document()).unwrap();

        assert_eq!(value["document_name"], "standard.txt");
        assert_eq!(value["metadata"]["type"], "PCI DSS Standard");
        assert_eq!(value["metadata"]["version"], "3.2.1");
        assert!(value["metadata"]["processed_date"].is_string());

        let requirement = &value["requirements"][0];
        assert_eq!(requirement["type"], "requirement");
        assert_eq!(requirement["number"], "3");
        assert_eq!(requirement["content"], "Keep it safe");

        let sub = &requirement["subrequirements"][0];
        assert_eq!(sub["type"], "subrequirement");
        assert_eq!(sub["number"], "3.1");
        assert!(sub.get("parent_number").is_none());
    }

    #[test]
    fn test_load_restores_parent_links() {
        let json = serde_json::to_string(&sample_document()).unwrap();
        let loaded = StructuredDocument::from_json(&json).unwrap();
        assert_eq!(loaded.requirements[0].subrequirements[0].parent_number, "3");
    }

    #[test]
    fn test_write_and_load_on_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("structured.json");
        let document = sample_document();

        document.write_json(&path).unwrap();
        let loaded = StructuredDocument::load_json(&path).unwrap();

        assert_eq!(loaded, document);
        assert_eq!(loaded.chunk_count(), 2);
    }

    #[test]
    fn test_load_timestamp_without_offset() {
        let json = r#"{
            "document_name": "PCI_DSS_v3-2-1.pdf",
            "metadata": {"type": "PCI DSS Standard", "version": "3.2.1", "processed_date": "2024-05-01T10:00:00.123456"},
            "requirements": [
                {"type": "requirement", "number": "3", "title": "Protect stored data", "content": "", "subrequirements": []}
            ]
        }"#;
        let loaded = StructuredDocument::from_json(json).unwrap();
        assert_eq!(
            loaded.processed_at().to_rfc3339(),
            "2024-05-01T10:00:00.123456+00:00"
        );
        assert_eq!(loaded.requirements[0].number, "3");
    }

    #[test]
    fn test_processed_date_formats() {
        let with_offset = parse_processed_date("2024-05-01T12:00:00+02:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert!(parse_processed_date("2024-05-01T10:00:00").is_ok());
        assert!(parse_processed_date("yesterday").is_err());
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let err = StructuredDocument::load_json(Path::new("/nonexistent/doc.json")).unwrap_err();
        assert!(matches!(err, RagError::NotFound { .. }));
    }

    #[test]
    fn test_metadata_omits_absent_optionals() {
        let metadata = ChunkMetadata {
            chunk_type: REQUIREMENT_TYPE.to_string(),
            number: "3".to_string(),
            title: "Protect stored data".to_string(),
            version: "3.2.1".to_string(),
            parent_requirement: None,
            page: None,
            section: None,
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["type"], "requirement");
        assert!(value.get("parent_requirement").is_none());
        assert_eq!(metadata.field("number").as_deref(), Some("3"));
        assert!(metadata.field("page").is_none());
    }

    #[test]
    fn test_leading_segment() {
        assert_eq!(leading_segment("3.2.1"), "3");
        assert_eq!(leading_segment("12"), "12");
    }
}
