use serde::{Deserialize, Serialize};

/// Dimensionality of `text-embedding-004` vectors.
pub const EMBEDDING_DIMENSIONS: usize = 768;

/// Configuration for the embedding model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub model_name: String,
    pub dimensions: usize,
}

impl EmbeddingConfig {
    pub fn new(model_name: String, dimensions: usize) -> Self {
        Self {
            model_name,
            dimensions,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_name: "models/text-embedding-004".to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }
}

/// Distance function used by a vector namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    L2,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::L2 => "l2",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Some(DistanceMetric::Cosine),
            "l2" | "euclidean" => Some(DistanceMetric::L2),
            _ => None,
        }
    }

    /// Converts a raw distance into a similarity score where higher means closer.
    pub fn score(&self, distance: f32) -> f32 {
        match self {
            DistanceMetric::Cosine => 1.0 - distance,
            DistanceMetric::L2 => 1.0 / (1.0 + distance),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_metric_parse() {
        assert_eq!(DistanceMetric::parse("COSINE"), Some(DistanceMetric::Cosine));
        assert_eq!(DistanceMetric::parse("euclidean"), Some(DistanceMetric::L2));
        assert_eq!(DistanceMetric::parse("dot"), None);
    }

    #[test]
    fn test_scores_are_monotonic() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            assert!(metric.score(0.1) > metric.score(0.5));
        }
    }
}
