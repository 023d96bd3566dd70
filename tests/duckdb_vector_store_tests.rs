use std::sync::Arc;

use coursecast::{
    CourseVectorService, DistanceMetric, DuckdbVectorStore, Metadata, MockEmbedding, Namespace,
    SearchQuery, VectorRecord, VectorStore, EMBEDDING_DIMENSIONS,
};
use serde_json::json;
use tempfile::tempdir;

fn unit_vector(dim: usize, hot_index: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot_index] = 1.0;
    v
}

fn record(id: &str, hot_index: usize) -> VectorRecord {
    let mut metadata = Metadata::new();
    metadata.insert("slot".to_string(), json!(hot_index));
    VectorRecord::new(
        id,
        format!("content {}", id),
        unit_vector(EMBEDDING_DIMENSIONS, hot_index),
        metadata,
    )
}

#[tokio::test]
async fn duckdb_vector_store_can_save_and_query() {
    let dir = tempdir().expect("tempdir");
    let store = DuckdbVectorStore::new(&dir.path().join("vectors.duckdb")).expect("duckdb init");
    let collection = store
        .provision(&Namespace::for_course(1))
        .await
        .expect("provision");

    collection.upsert(&record("a", 0)).await.expect("upsert a");
    collection.upsert(&record("b", 1)).await.expect("upsert b");

    let hits = collection
        .query(&unit_vector(EMBEDDING_DIMENSIONS, 1), 2)
        .await
        .expect("query");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.content_id(), "b");
    assert!(hits[0].score > 0.99, "expected near-identical score");
    assert!(hits[1].score < hits[0].score);
    assert_eq!(hits[0].record.metadata().get("slot"), Some(&json!(1)));
}

#[tokio::test]
async fn duckdb_vector_store_upsert_replaces_by_content_id() {
    let dir = tempdir().expect("tempdir");
    let store = DuckdbVectorStore::new(&dir.path().join("vectors.duckdb")).expect("duckdb init");
    let collection = store
        .provision(&Namespace::for_course(2))
        .await
        .expect("provision");

    collection.upsert(&record("a", 0)).await.expect("first");
    collection.upsert(&record("a", 5)).await.expect("second");

    assert_eq!(collection.count().await.expect("count"), 1);
    let stored = collection.get("a").await.expect("get").expect("present");
    assert_eq!(stored.embedding(), unit_vector(EMBEDDING_DIMENSIONS, 5).as_slice());
}

#[tokio::test]
async fn duckdb_vector_store_delete_reports_removal() {
    let dir = tempdir().expect("tempdir");
    let store = DuckdbVectorStore::new(&dir.path().join("vectors.duckdb")).expect("duckdb init");
    let collection = store
        .provision(&Namespace::for_course(3))
        .await
        .expect("provision");

    collection.upsert(&record("gone", 2)).await.expect("upsert");

    assert!(collection.delete("gone").await.expect("delete"));
    assert!(!collection.delete("gone").await.expect("delete again"));
    assert!(collection.get("gone").await.expect("get").is_none());
}

#[tokio::test]
async fn duckdb_vector_store_provision_keeps_existing_rows() {
    let dir = tempdir().expect("tempdir");
    let store = DuckdbVectorStore::new(&dir.path().join("vectors.duckdb")).expect("duckdb init");
    let namespace = Namespace::for_course(4);

    assert!(!store.exists(&namespace).await.expect("exists"));

    let first = store.provision(&namespace).await.expect("provision");
    first.upsert(&record("kept", 3)).await.expect("upsert");

    let second = store.provision(&namespace).await.expect("provision again");
    assert!(store.exists(&namespace).await.expect("exists"));
    assert_eq!(second.count().await.expect("count"), 1);
    assert!(store.ping().await.is_ok());
}

#[tokio::test]
async fn duckdb_vector_store_l2_distance_orders_nearest_first() {
    let store = DuckdbVectorStore::in_memory()
        .expect("duckdb init")
        .with_distance(DistanceMetric::L2);
    let collection = store
        .provision(&Namespace::for_course(5))
        .await
        .expect("provision");

    collection.upsert(&record("near", 7)).await.expect("upsert");
    collection.upsert(&record("far", 8)).await.expect("upsert");

    let hits = collection
        .query(&unit_vector(EMBEDDING_DIMENSIONS, 7), 1)
        .await
        .expect("query");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].record.content_id(), "near");
    assert!((hits[0].score - 1.0).abs() < 1e-4);
}

#[tokio::test]
async fn duckdb_vector_store_unbounded_limit_returns_every_row() {
    let store = DuckdbVectorStore::in_memory().expect("duckdb init");
    let collection = store
        .provision(&Namespace::for_course(6))
        .await
        .expect("provision");

    collection.upsert(&record("a", 0)).await.expect("upsert a");
    collection.upsert(&record("b", 1)).await.expect("upsert b");

    let hits = collection
        .query(&unit_vector(EMBEDDING_DIMENSIONS, 0), usize::MAX)
        .await
        .expect("query with usize::MAX");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.content_id(), "a");
}

#[tokio::test]
async fn course_search_with_unbounded_limit_on_duckdb() {
    let service = CourseVectorService::new(
        Arc::new(DuckdbVectorStore::in_memory().expect("duckdb init")),
        Arc::new(MockEmbedding::new()),
    );
    service
        .add(7, "c1", "graphs have vertices", Metadata::new())
        .await
        .expect("add");

    let results = service
        .search(7, &SearchQuery::new("graphs have vertices").with_limit(usize::MAX))
        .await
        .expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content_id(), "c1");
}
