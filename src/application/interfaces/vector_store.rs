use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DomainError, Namespace, VectorRecord};

/// A nearest-neighbour hit returned by a collection, before metadata filtering.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}

/// Backing store that owns vector namespaces.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Creates the namespace's storage if absent and returns a handle to it.
    /// Calling it for an existing namespace must not touch its records.
    async fn provision(&self, namespace: &Namespace)
        -> Result<Arc<dyn VectorCollection>, DomainError>;

    async fn exists(&self, namespace: &Namespace) -> Result<bool, DomainError>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<(), DomainError>;
}

/// Record operations scoped to a single namespace.
#[async_trait]
pub trait VectorCollection: Send + Sync {
    fn namespace(&self) -> &Namespace;

    /// Inserts the record, replacing any record with the same content id.
    async fn upsert(&self, record: &VectorRecord) -> Result<(), DomainError>;

    async fn get(&self, content_id: &str) -> Result<Option<VectorRecord>, DomainError>;

    /// Returns up to `k` records ordered by decreasing score.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredRecord>, DomainError>;

    /// Returns whether a record was removed.
    async fn delete(&self, content_id: &str) -> Result<bool, DomainError>;

    async fn count(&self) -> Result<u64, DomainError>;
}
