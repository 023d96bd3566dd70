use async_trait::async_trait;
use rand::Rng;
use rand::SeedableRng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingConfig, EMBEDDING_DIMENSIONS};

/// Deterministic offline embeddings: identical text always yields the identical unit vector.
pub struct MockEmbedding {
    config: EmbeddingConfig,
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(EMBEDDING_DIMENSIONS)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            config: EmbeddingConfig::new("mock-embedding".to_string(), dimensions),
        }
    }

    fn generate_embedding(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        let mut vector: Vec<f32> = (0..self.config.dimensions())
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();

        let magnitude: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }

        vector
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let vector = self.generate_embedding(text);
        debug!("Generated mock embedding with {} dimensions", vector.len());
        Ok(vector)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embedding_consistency() {
        let service = MockEmbedding::new();

        let embedding1 = service.embed("hello world").await.unwrap();
        let embedding2 = service.embed("hello world").await.unwrap();

        assert_eq!(embedding1, embedding2);
    }

    #[tokio::test]
    async fn test_mock_embedding_default_dimensions() {
        let service = MockEmbedding::new();

        let embedding = service.embed("test").await.unwrap();

        assert_eq!(embedding.len(), 768);
    }

    #[tokio::test]
    async fn test_mock_embedding_normalized() {
        let service = MockEmbedding::with_dimensions(128);

        let embedding = service.embed("test").await.unwrap();
        let magnitude: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

        assert_eq!(embedding.len(), 128);
        assert!((magnitude - 1.0).abs() < 0.001);
    }
}
