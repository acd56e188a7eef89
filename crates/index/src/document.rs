use chrono::{DateTime, Utc};
use semantic::EmbedderId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of a knowledge-base document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocType {
    #[serde(rename = "SOP")]
    Sop,
    #[serde(rename = "MANUAL")]
    Manual,
    #[serde(rename = "QC")]
    Qc,
    #[serde(rename = "INCIDENT")]
    Incident,
}

impl DocType {
    pub const ALL: [DocType; 4] = [DocType::Sop, DocType::Manual, DocType::Qc, DocType::Incident];

    /// Wire name, e.g. `"SOP"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Sop => "SOP",
            DocType::Manual => "MANUAL",
            DocType::Qc => "QC",
            DocType::Incident => "INCIDENT",
        }
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = String;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        DocType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!("unknown document type '{s}' (expected SOP, MANUAL, QC or INCIDENT)")
            })
    }
}

/// Input for [`DocumentStore::create_document`](crate::DocumentStore::create_document).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub title: String,
    pub doc_type: DocType,
    pub source_path: Option<String>,
}

impl NewDocument {
    pub fn new(title: impl Into<String>, doc_type: DocType) -> Self {
        Self {
            title: title.into(),
            doc_type,
            source_path: None,
        }
    }

    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }
}

/// A stored document. Text lives in its chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: u64,
    pub title: String,
    pub doc_type: DocType,
    pub source_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn to_ref(&self) -> DocumentRef {
        DocumentRef {
            id: self.id,
            title: self.title.clone(),
            doc_type: self.doc_type,
        }
    }
}

/// The part of a document every chunk carries along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: u64,
    pub title: String,
    pub doc_type: DocType,
}

/// One embedded piece of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub document: DocumentRef,
    /// Unique within `document`.
    pub chunk_index: u32,
    pub text: String,
    pub embedding: Vec<f32>,
    pub embedder: EmbedderId,
    pub created_at: DateTime<Utc>,
}

/// Selection for [`DocumentStore::list_chunks`](crate::DocumentStore::list_chunks).
/// Empty filter lists everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFilter {
    pub document_id: Option<u64>,
    pub doc_type: Option<DocType>,
    pub limit: Option<usize>,
}

impl ChunkFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn document(id: u64) -> Self {
        Self {
            document_id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_doc_type(mut self, doc_type: DocType) -> Self {
        self.doc_type = Some(doc_type);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub(crate) fn matches(&self, chunk: &DocumentChunk) -> bool {
        self.document_id.map_or(true, |id| chunk.document.id == id)
            && self.doc_type.map_or(true, |t| chunk.document.doc_type == t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_type_parses_case_insensitively() {
        assert_eq!("sop".parse::<DocType>().unwrap(), DocType::Sop);
        assert_eq!(" Incident ".parse::<DocType>().unwrap(), DocType::Incident);
        assert!("memo".parse::<DocType>().is_err());
    }

    #[test]
    fn doc_type_uses_upper_case_wire_names() {
        assert_eq!(serde_json::to_string(&DocType::Manual).unwrap(), "\"MANUAL\"");
        let parsed: DocType = serde_json::from_str("\"QC\"").unwrap();
        assert_eq!(parsed, DocType::Qc);
        assert_eq!(DocType::Qc.to_string(), "QC");
    }
}
