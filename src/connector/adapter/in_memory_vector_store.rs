use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::application::{ScoredRecord, VectorCollection, VectorStore};
use crate::domain::{DistanceMetric, DomainError, Namespace, VectorRecord};

/// Process-local vector store; every namespace is a map of content id to record.
pub struct InMemoryVectorStore {
    collections: Mutex<HashMap<Namespace, Arc<InMemoryCollection>>>,
    distance: DistanceMetric,
    provisions: AtomicUsize,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::with_distance(DistanceMetric::default())
    }

    pub fn with_distance(distance: DistanceMetric) -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            distance,
            provisions: AtomicUsize::new(0),
        }
    }

    /// Number of namespaces actually created.
    pub fn provision_count(&self) -> usize {
        self.provisions.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn provision(
        &self,
        namespace: &Namespace,
    ) -> Result<Arc<dyn VectorCollection>, DomainError> {
        let mut collections = self.collections.lock().await;
        let collection = collections
            .entry(namespace.clone())
            .or_insert_with(|| {
                self.provisions.fetch_add(1, Ordering::SeqCst);
                debug!("Created in-memory namespace {}", namespace);
                Arc::new(InMemoryCollection {
                    namespace: namespace.clone(),
                    records: RwLock::new(HashMap::new()),
                    distance: self.distance,
                })
            })
            .clone();
        Ok(collection)
    }

    async fn exists(&self, namespace: &Namespace) -> Result<bool, DomainError> {
        Ok(self.collections.lock().await.contains_key(namespace))
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }
}

pub struct InMemoryCollection {
    namespace: Namespace,
    records: RwLock<HashMap<String, VectorRecord>>,
    distance: DistanceMetric,
}

#[async_trait]
impl VectorCollection for InMemoryCollection {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn upsert(&self, record: &VectorRecord) -> Result<(), DomainError> {
        let mut records = self.records.write().await;
        records.insert(record.content_id().to_string(), record.clone());
        debug!(
            "Stored {} in {} ({} records)",
            record.content_id(),
            self.namespace,
            records.len()
        );
        Ok(())
    }

    async fn get(&self, content_id: &str) -> Result<Option<VectorRecord>, DomainError> {
        Ok(self.records.read().await.get(content_id).cloned())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredRecord>, DomainError> {
        let records = self.records.read().await;
        let mut scored: Vec<ScoredRecord> = records
            .values()
            .map(|record| {
                let distance = match self.distance {
                    DistanceMetric::Cosine => 1.0 - cosine_similarity(embedding, record.embedding()),
                    DistanceMetric::L2 => l2_distance(embedding, record.embedding()),
                };
                ScoredRecord {
                    record: record.clone(),
                    score: self.distance.score(distance),
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    async fn delete(&self, content_id: &str) -> Result<bool, DomainError> {
        Ok(self.records.write().await.remove(content_id).is_some())
    }

    async fn count(&self) -> Result<u64, DomainError> {
        Ok(self.records.read().await.len() as u64)
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Metadata;

    fn unit_vector(dim: usize, hot_index: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[hot_index] = 1.0;
        v
    }

    #[tokio::test]
    async fn test_provision_reuses_namespace() {
        let store = InMemoryVectorStore::new();
        let ns = Namespace::for_course(1);

        let first = store.provision(&ns).await.unwrap();
        first
            .upsert(&VectorRecord::new("a", "alpha", unit_vector(4, 0), Metadata::new()))
            .await
            .unwrap();
        let second = store.provision(&ns).await.unwrap();

        assert_eq!(second.count().await.unwrap(), 1);
        assert_eq!(store.provision_count(), 1);
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        for metric in [DistanceMetric::Cosine, DistanceMetric::L2] {
            let store = InMemoryVectorStore::with_distance(metric);
            let collection = store.provision(&Namespace::for_course(2)).await.unwrap();
            for i in 0..3 {
                collection
                    .upsert(&VectorRecord::new(
                        format!("c{}", i),
                        "text",
                        unit_vector(4, i),
                        Metadata::new(),
                    ))
                    .await
                    .unwrap();
            }

            let hits = collection.query(&unit_vector(4, 1), 2).await.unwrap();

            assert_eq!(hits.len(), 2);
            assert_eq!(hits[0].record.content_id(), "c1");
            assert!(hits[0].score > hits[1].score);
        }
    }

    #[tokio::test]
    async fn test_upsert_replaces_record() {
        let store = InMemoryVectorStore::new();
        let collection = store.provision(&Namespace::for_course(3)).await.unwrap();

        collection
            .upsert(&VectorRecord::new("a", "old", unit_vector(4, 0), Metadata::new()))
            .await
            .unwrap();
        collection
            .upsert(&VectorRecord::new("a", "new", unit_vector(4, 1), Metadata::new()))
            .await
            .unwrap();

        assert_eq!(collection.count().await.unwrap(), 1);
        assert_eq!(collection.get("a").await.unwrap().unwrap().text(), "new");
        assert!(collection.delete("a").await.unwrap());
        assert!(!collection.delete("a").await.unwrap());
    }
}
