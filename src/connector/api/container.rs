use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::application::{
    ConnectionRegistry, CourseNotifier, CourseVectorService, EmbeddingService,
    VectorServiceConfig, VectorStore,
};
use crate::connector::adapter::http::AppState;
use crate::connector::adapter::{
    DuckdbVectorStore, GeminiEmbedding, InMemoryVectorStore, MockEmbedding, DEFAULT_BASE_URL,
};
use crate::domain::DistanceMetric;

pub struct ContainerConfig {
    pub data_dir: String,
    pub memory_storage: bool,
    pub mock_embeddings: bool,
    /// Falls back to the `GOOGLE_API_KEY` environment variable when unset.
    pub google_api_key: Option<String>,
    pub embedding_model: String,
    pub distance: DistanceMetric,
    pub hnsw_index: bool,
}

pub struct Container {
    vector_service: Arc<CourseVectorService>,
    notifier: CourseNotifier,
    config: ContainerConfig,
}

impl Container {
    pub async fn new(config: ContainerConfig) -> Result<Self> {
        let db_path = PathBuf::from(&config.data_dir).join("coursecast.duckdb");
        let service_config = VectorServiceConfig::default();

        let embedding_service: Arc<dyn EmbeddingService> = if config.mock_embeddings {
            debug!("Using mock embedding service");
            Arc::new(MockEmbedding::new())
        } else {
            debug!("Using Gemini embedding model {}", config.embedding_model);
            match config.google_api_key.as_deref() {
                Some(key) => Arc::new(GeminiEmbedding::new(
                    key,
                    config.embedding_model.as_str(),
                    DEFAULT_BASE_URL,
                    service_config.embed_timeout,
                )),
                None => Arc::new(GeminiEmbedding::from_env(service_config.embed_timeout)?),
            }
        };

        let store: Arc<dyn VectorStore> = if config.memory_storage {
            debug!("Using in-memory vector storage");
            Arc::new(InMemoryVectorStore::with_distance(config.distance))
        } else {
            match DuckdbVectorStore::new(&db_path) {
                Ok(duckdb) => {
                    debug!(
                        "Using DuckDB vector storage at {:?} ({} distance)",
                        db_path,
                        config.distance.as_str()
                    );
                    Arc::new(
                        duckdb
                            .with_dimensions(service_config.dimensions)
                            .with_distance(config.distance)
                            .with_hnsw_index(config.hnsw_index),
                    )
                }
                Err(e) => {
                    warn!(
                        "Failed to initialize DuckDB ({}): {}. Falling back to in-memory storage.",
                        db_path.display(),
                        e
                    );
                    Arc::new(InMemoryVectorStore::with_distance(config.distance))
                }
            }
        };

        let vector_service = Arc::new(CourseVectorService::with_config(
            store,
            embedding_service,
            service_config,
        ));
        let notifier = CourseNotifier::new(Arc::new(ConnectionRegistry::new()));

        Ok(Self {
            vector_service,
            notifier,
            config,
        })
    }

    pub fn vector_service(&self) -> Arc<CourseVectorService> {
        self.vector_service.clone()
    }

    pub fn notifier(&self) -> CourseNotifier {
        self.notifier.clone()
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.notifier.registry().clone()
    }

    /// State for the HTTP/WebSocket server, sharing this container's services.
    pub fn app_state(&self) -> AppState {
        AppState::new(self.vector_service(), self.notifier())
    }

    pub fn data_dir(&self) -> &str {
        &self.config.data_dir
    }

    pub fn memory_storage(&self) -> bool {
        self.config.memory_storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config() -> ContainerConfig {
        ContainerConfig {
            data_dir: "/nonexistent".to_string(),
            memory_storage: true,
            mock_embeddings: true,
            google_api_key: None,
            embedding_model: "models/text-embedding-004".to_string(),
            distance: DistanceMetric::Cosine,
            hnsw_index: false,
        }
    }

    #[tokio::test]
    async fn test_memory_container_round_trip() {
        let container = Container::new(memory_config()).await.unwrap();
        let vectors = container.vector_service();

        vectors
            .add(3, "c1", "graph traversal", Default::default())
            .await
            .unwrap();

        assert_eq!(vectors.count(3).await.unwrap(), 1);
        assert!(container.memory_storage());
        assert!(container.registry().is_empty().await);
    }
}
