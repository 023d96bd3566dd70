use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use crate::application::{EmbeddingService, VectorCollection, VectorStore};
use crate::domain::{
    CourseId, DomainError, Metadata, Namespace, SearchQuery, SearchResult, VectorRecord,
    EMBEDDING_DIMENSIONS,
};

const HEALTH_PROBE: &str = "test";

#[derive(Debug, Clone)]
pub struct VectorServiceConfig {
    /// Every embedding must have exactly this many components.
    pub dimensions: usize,
    pub embed_timeout: Duration,
    pub storage_timeout: Duration,
}

impl Default for VectorServiceConfig {
    fn default() -> Self {
        Self {
            dimensions: EMBEDDING_DIMENSIONS,
            embed_timeout: Duration::from_secs(30),
            storage_timeout: Duration::from_secs(10),
        }
    }
}

type HandleCell = Arc<OnceCell<Arc<dyn VectorCollection>>>;

/// Routes course content to a per-course vector namespace.
///
/// Namespace handles are memoised per course. Provisioning runs inside a
/// per-course `OnceCell`, so concurrent first writers provision once and a
/// failed attempt can be retried by the next caller.
pub struct CourseVectorService {
    store: Arc<dyn VectorStore>,
    embedding_service: Arc<dyn EmbeddingService>,
    handles: Mutex<HashMap<CourseId, HandleCell>>,
    config: VectorServiceConfig,
}

impl CourseVectorService {
    pub fn new(store: Arc<dyn VectorStore>, embedding_service: Arc<dyn EmbeddingService>) -> Self {
        Self::with_config(store, embedding_service, VectorServiceConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn VectorStore>,
        embedding_service: Arc<dyn EmbeddingService>,
        config: VectorServiceConfig,
    ) -> Self {
        Self {
            store,
            embedding_service,
            handles: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn namespace_for(&self, course_id: CourseId) -> Namespace {
        Namespace::for_course(course_id)
    }

    /// Provisions the course namespace if needed and returns its handle.
    pub async fn ensure_namespace(
        &self,
        course_id: CourseId,
    ) -> Result<Arc<dyn VectorCollection>, DomainError> {
        let cell = {
            let mut handles = self.handles.lock().await;
            handles.entry(course_id).or_default().clone()
        };

        let handle = cell
            .get_or_try_init(|| async {
                let namespace = self.namespace_for(course_id);
                info!("Provisioning namespace {} for course {}", namespace, course_id);
                self.bounded_storage("provision", self.store.provision(&namespace))
                    .await
            })
            .await?;

        Ok(Arc::clone(handle))
    }

    /// Handle for a namespace that already exists. Never provisions.
    async fn existing_namespace(
        &self,
        course_id: CourseId,
    ) -> Result<Option<Arc<dyn VectorCollection>>, DomainError> {
        let cached = {
            let handles = self.handles.lock().await;
            handles
                .get(&course_id)
                .and_then(|cell| cell.get().cloned())
        };
        if cached.is_some() {
            return Ok(cached);
        }

        let namespace = self.namespace_for(course_id);
        if self.bounded_storage("exists", self.store.exists(&namespace)).await? {
            self.ensure_namespace(course_id).await.map(Some)
        } else {
            Ok(None)
        }
    }

    pub async fn add(
        &self,
        course_id: CourseId,
        content_id: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<(), DomainError> {
        validate_content_id(content_id)?;

        let embedding = self.embed(text).await?;
        let record = VectorRecord::new(content_id, text, embedding, metadata);
        let collection = self.ensure_namespace(course_id).await?;

        self.bounded_storage("insert", collection.upsert(&record))
            .await?;

        info!("Added content {} to course {}", content_id, course_id);
        Ok(())
    }

    pub async fn search(
        &self,
        course_id: CourseId,
        query: &SearchQuery,
    ) -> Result<Vec<SearchResult>, DomainError> {
        if query.limit() == 0 {
            return Ok(Vec::new());
        }

        let Some(collection) = self.existing_namespace(course_id).await? else {
            debug!("Course {} has no namespace yet; nothing to search", course_id);
            return Ok(Vec::new());
        };

        let embedding = self.embed(query.query()).await?;
        let hits = self
            .bounded_storage("query", collection.query(&embedding, query.limit()))
            .await?;

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|hit| query.matches(hit.record.metadata()))
            .take(query.limit())
            .map(|hit| SearchResult::from_record(hit.record, hit.score))
            .collect();

        debug!(
            "Search in course {} ({}) returned {} results",
            course_id,
            query.summary(),
            results.len()
        );
        Ok(results)
    }

    /// Removes the record. Returns whether a record existed.
    pub async fn delete(&self, course_id: CourseId, content_id: &str) -> Result<bool, DomainError> {
        let Some(collection) = self.existing_namespace(course_id).await? else {
            return Ok(false);
        };

        let removed = self
            .bounded_storage("delete", collection.delete(content_id))
            .await?;
        if removed {
            info!("Deleted content {} from course {}", content_id, course_id);
        }
        Ok(removed)
    }

    /// Replaces a record by delete-then-insert.
    ///
    /// The new text is embedded before anything is removed. If the insert fails
    /// the previous record is written back and the insert error is returned.
    /// A crash between the delete and the insert still leaves the content
    /// absent until the update is retried.
    pub async fn update(
        &self,
        course_id: CourseId,
        content_id: &str,
        text: &str,
        metadata: Metadata,
    ) -> Result<(), DomainError> {
        validate_content_id(content_id)?;

        let embedding = self.embed(text).await?;
        let collection = self.ensure_namespace(course_id).await?;
        let previous = self
            .bounded_storage("get", collection.get(content_id))
            .await?;

        self.bounded_storage("delete", collection.delete(content_id))
            .await?;

        let record = VectorRecord::new(content_id, text, embedding, metadata);
        if let Err(insert_err) = self
            .bounded_storage("insert", collection.upsert(&record))
            .await
        {
            if let Some(previous) = previous {
                match self
                    .bounded_storage("restore", collection.upsert(&previous))
                    .await
                {
                    Ok(()) => warn!(
                        "Update of content {} in course {} failed; previous version restored",
                        content_id, course_id
                    ),
                    Err(restore_err) => error!(
                        "Update of content {} in course {} failed and restore failed: {}",
                        content_id, course_id, restore_err
                    ),
                }
            }
            return Err(insert_err);
        }

        info!("Updated content {} in course {}", content_id, course_id);
        Ok(())
    }

    pub async fn get(
        &self,
        course_id: CourseId,
        content_id: &str,
    ) -> Result<Option<VectorRecord>, DomainError> {
        match self.existing_namespace(course_id).await? {
            Some(collection) => self.bounded_storage("get", collection.get(content_id)).await,
            None => Ok(None),
        }
    }

    pub async fn count(&self, course_id: CourseId) -> Result<u64, DomainError> {
        match self.existing_namespace(course_id).await? {
            Some(collection) => self.bounded_storage("count", collection.count()).await,
            None => Ok(0),
        }
    }

    /// True when the backend answers and the provider returns a correctly sized probe embedding.
    pub async fn health_check(&self) -> bool {
        if let Err(e) = self.bounded_storage("ping", self.store.ping()).await {
            warn!("Health check failed: vector store unreachable: {}", e);
            return false;
        }

        match self.embed(HEALTH_PROBE).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Health check failed: {}", e);
                false
            }
        }
    }

    pub async fn cached_namespaces(&self) -> usize {
        let handles = self.handles.lock().await;
        handles.values().filter(|cell| cell.initialized()).count()
    }

    pub fn config(&self) -> &VectorServiceConfig {
        &self.config
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let vector = match tokio::time::timeout(
            self.config.embed_timeout,
            self.embedding_service.embed(text),
        )
        .await
        {
            Ok(Ok(vector)) => vector,
            Ok(Err(DomainError::EmbeddingError(msg))) => return Err(DomainError::EmbeddingError(msg)),
            Ok(Err(other)) => return Err(DomainError::embedding(other.to_string())),
            Err(_) => {
                return Err(DomainError::embedding(format!(
                    "Embedding provider timed out after {}s",
                    self.config.embed_timeout.as_secs_f64()
                )))
            }
        };

        if vector.len() != self.config.dimensions {
            return Err(DomainError::embedding(format!(
                "Expected embedding dimension {}, got {}",
                self.config.dimensions,
                vector.len()
            )));
        }
        Ok(vector)
    }

    async fn bounded_storage<T, F>(&self, operation: &str, fut: F) -> Result<T, DomainError>
    where
        F: Future<Output = Result<T, DomainError>>,
    {
        match tokio::time::timeout(self.config.storage_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::storage(format!(
                "Vector store {} timed out after {}s",
                operation,
                self.config.storage_timeout.as_secs_f64()
            ))),
        }
    }
}

fn validate_content_id(content_id: &str) -> Result<(), DomainError> {
    if content_id.trim().is_empty() {
        return Err(DomainError::invalid_input("content_id must not be empty"));
    }
    Ok(())
}
