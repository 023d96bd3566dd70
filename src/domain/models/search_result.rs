use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Metadata, VectorRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    content_id: String,
    text: String,
    metadata: Metadata,
    score: f32,
}

impl SearchResult {
    pub fn new(content_id: String, text: String, metadata: Metadata, score: f32) -> Self {
        Self {
            content_id,
            text,
            metadata,
            score,
        }
    }

    pub fn from_record(record: VectorRecord, score: f32) -> Self {
        let metadata = record.metadata().clone();
        Self::new(
            record.content_id().to_string(),
            record.text().to_string(),
            metadata,
            score,
        )
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn score(&self) -> f32 {
        self.score
    }

    pub fn display_line(&self) -> String {
        format!("{} (score: {:.3})", self.content_id, self.score)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    query: String,
    limit: usize,
    filter: Option<Metadata>,
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: 5,
            filter: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_filter(mut self, filter: Metadata) -> Self {
        self.filter = if filter.is_empty() { None } else { Some(filter) };
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn filter(&self) -> Option<&Metadata> {
        self.filter.as_ref()
    }

    /// Exact-match AND over every filter key. A `null` filter value also
    /// matches a record that lacks the key.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match &self.filter {
            None => true,
            Some(filter) => filter
                .iter()
                .all(|(key, expected)| metadata.get(key).unwrap_or(&Value::Null) == expected),
        }
    }

    pub fn summary(&self) -> String {
        let mut parts = vec![format!("query=\"{}\"", self.query)];
        parts.push(format!("limit={}", self.limit));
        if let Some(ref filter) = self.filter {
            parts.push(format!("filter={}", Value::Object(filter.clone())));
        }
        parts.join(", ")
    }
}
