//! The retrievable unit: a chunk of text with provenance metadata and an
//! optional embedding.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::doc_id::DocumentId;

/// Metadata key holding the originating file of a line document.
pub const FILE_PATH_KEY: &str = "file_path";

/// A scalar metadata value.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl MetaValue {
    /// Convert a JSON value, returning `None` for null, arrays and objects.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Ordered string → scalar mapping attached to every document.
pub type Metadata = BTreeMap<String, MetaValue>;

/// A single retrievable unit.
///
/// Documents are immutable once the embedding is attached. Metadata is
/// behind an [`Arc`] so all bullets of one record share a single map.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    pub metadata: Arc<Metadata>,
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(
        id: DocumentId,
        content: impl Into<String>,
        metadata: Arc<Metadata>,
    ) -> Self {
        Self {
            id,
            content: content.into(),
            metadata,
            embedding: None,
        }
    }

    /// Attach an embedding, consuming the un-embedded document.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Human-readable provenance for result listings.
    ///
    /// Uses `file_path` when present, otherwise the metadata as
    /// `key=value` pairs, otherwise the short document id.
    pub fn source_label(&self) -> String {
        if let Some(path) = self.metadata.get(FILE_PATH_KEY) {
            return path.to_string();
        }
        if self.metadata.is_empty() {
            return self.id.to_string();
        }
        self.metadata
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A document paired with the score a retriever assigned to it.
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub document: Arc<Document>,
    pub score: f32,
}
