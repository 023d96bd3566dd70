use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form metadata stored alongside a vector record.
pub type Metadata = Map<String, Value>;

/// One piece of course content with its embedding.
///
/// `content_id` is unique within the course namespace. Writing a record with an
/// existing id replaces the previous record entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    content_id: String,
    text: String,
    embedding: Vec<f32>,
    metadata: Metadata,
}

impl VectorRecord {
    pub fn new(
        content_id: impl Into<String>,
        text: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Metadata,
    ) -> Self {
        Self {
            content_id: content_id.into(),
            text: text.into(),
            embedding,
            metadata,
        }
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}
