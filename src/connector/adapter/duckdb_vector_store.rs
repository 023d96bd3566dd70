use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use duckdb::{params, Connection, Row};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::application::{ScoredRecord, VectorCollection, VectorStore};
use crate::domain::{
    DistanceMetric, DomainError, Metadata, Namespace, VectorRecord, EMBEDDING_DIMENSIONS,
};

/// DuckDB-backed vector store. Each namespace is one table in the `main` schema.
///
/// DuckDB calls are synchronous, so every statement runs on the blocking pool.
/// Callers awaiting a store method can therefore time out while a statement
/// is still executing.
pub struct DuckdbVectorStore {
    conn: Arc<Mutex<Connection>>,
    dimensions: usize,
    distance: DistanceMetric,
    hnsw_index: bool,
}

/// Runs `op` against the shared connection on a blocking thread.
async fn run_blocking<T, F>(conn: &Arc<Mutex<Connection>>, op: F) -> Result<T, DomainError>
where
    T: Send + 'static,
    F: FnOnce(&Connection) -> Result<T, DomainError> + Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let conn = conn.blocking_lock();
        op(&conn)
    })
    .await
    .map_err(|e| DomainError::storage(format!("DuckDB task failed: {}", e)))?
}

impl DuckdbVectorStore {
    pub fn new(path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::storage(format!("Failed to open DuckDB database: {}", e)))?;
        info!("Opened DuckDB vector store at {}", path.display());
        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            DomainError::storage(format!("Failed to open DuckDB in-memory DB: {}", e))
        })?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            dimensions: EMBEDDING_DIMENSIONS,
            distance: DistanceMetric::default(),
            hnsw_index: false,
        }
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    /// Builds an HNSW index per namespace. Requires the `vss` extension to be installable.
    pub fn with_hnsw_index(mut self, enabled: bool) -> Self {
        self.hnsw_index = enabled;
        self
    }
}

fn create_hnsw_index(
    conn: &Connection,
    namespace: &Namespace,
    distance: DistanceMetric,
) -> Result<(), DomainError> {
    conn.execute_batch("INSTALL vss; LOAD vss;")
        .map_err(|e| DomainError::storage(format!("Failed to load vss: {}", e)))?;
    conn.execute_batch("SET hnsw_enable_experimental_persistence = true;")
        .map_err(|e| DomainError::storage(format!("Failed to set HNSW persistence: {}", e)))?;

    let metric = match distance {
        DistanceMetric::Cosine => "cosine",
        DistanceMetric::L2 => "l2sq",
    };
    conn.execute_batch(&format!(
        "CREATE INDEX IF NOT EXISTS \"{ns}_hnsw_idx\" ON \"{ns}\" USING HNSW (embedding) WITH (metric = '{metric}');",
        ns = namespace,
        metric = metric
    ))
    .map_err(|e| DomainError::storage(format!("Failed to create HNSW index: {}", e)))?;
    Ok(())
}

#[async_trait]
impl VectorStore for DuckdbVectorStore {
    async fn provision(
        &self,
        namespace: &Namespace,
    ) -> Result<Arc<dyn VectorCollection>, DomainError> {
        let table = namespace.clone();
        let dimensions = self.dimensions;
        let distance = self.distance;
        let hnsw_index = self.hnsw_index;

        run_blocking(&self.conn, move |conn| {
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS \"{}\" (
                    content_id TEXT PRIMARY KEY,
                    text TEXT NOT NULL,
                    embedding FLOAT[{}] NOT NULL,
                    metadata TEXT NOT NULL
                );",
                table, dimensions
            ))
            .map_err(|e| {
                DomainError::storage(format!("Failed to create namespace {}: {}", table, e))
            })?;

            if hnsw_index {
                create_hnsw_index(conn, &table, distance)?;
            }
            Ok(())
        })
        .await?;
        debug!("DuckDB namespace {} ready", namespace);

        Ok(Arc::new(DuckdbCollection {
            conn: Arc::clone(&self.conn),
            namespace: namespace.clone(),
            dimensions: self.dimensions,
            distance: self.distance,
        }))
    }

    async fn exists(&self, namespace: &Namespace) -> Result<bool, DomainError> {
        let table = namespace.as_str().to_string();
        let count: i64 = run_blocking(&self.conn, move |conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
                params![table],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::storage(format!("Failed to look up namespace: {}", e)))
        })
        .await?;
        Ok(count > 0)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        run_blocking(&self.conn, |conn| {
            conn.execute_batch("SELECT 1;")
                .map_err(|e| DomainError::storage(format!("DuckDB ping failed: {}", e)))
        })
        .await
    }
}

pub struct DuckdbCollection {
    conn: Arc<Mutex<Connection>>,
    namespace: Namespace,
    dimensions: usize,
    distance: DistanceMetric,
}

impl DuckdbCollection {
    fn vector_to_array_literal(&self, vector: &[f32]) -> Result<String, DomainError> {
        if vector.len() != self.dimensions {
            return Err(DomainError::invalid_input(format!(
                "Expected embedding dimension {}, got {}",
                self.dimensions,
                vector.len()
            )));
        }
        let mut s = String::with_capacity(vector.len() * 8);
        s.push('[');
        for (i, v) in vector.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            s.push_str(&format!("{}", v));
        }
        s.push(']');
        s.push_str(&format!("::FLOAT[{}]", self.dimensions));
        Ok(s)
    }

    fn distance_function(&self) -> &'static str {
        match self.distance {
            DistanceMetric::Cosine => "array_cosine_distance",
            DistanceMetric::L2 => "array_distance",
        }
    }
}

/// Reads `content_id, text, embedding-as-text, metadata` starting at column 0.
fn record_from_row(row: &Row<'_>) -> Result<VectorRecord, DomainError> {
    let read = |i: usize| -> Result<String, DomainError> {
        row.get::<_, String>(i)
            .map_err(|e| DomainError::storage(format!("Failed to read column {}: {}", i, e)))
    };

    let content_id = read(0)?;
    let text = read(1)?;
    let embedding = parse_array_text(&read(2)?)?;
    let metadata: Metadata = serde_json::from_str(&read(3)?).map_err(|e| {
        DomainError::storage(format!("Corrupt metadata for {}: {}", content_id, e))
    })?;
    Ok(VectorRecord::new(content_id, text, embedding, metadata))
}

/// Parses DuckDB's text rendering of an array, e.g. `[0.5, -1.0]`.
fn parse_array_text(text: &str) -> Result<Vec<f32>, DomainError> {
    let inner = text
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| DomainError::storage(format!("Unexpected array text: {}", text)))?;

    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f32>()
                .map_err(|e| DomainError::storage(format!("Bad array element '{}': {}", part, e)))
        })
        .collect()
}

/// LIMIT takes a signed BIGINT; anything larger means "all rows".
fn limit_param(k: usize) -> i64 {
    i64::try_from(k).unwrap_or(i64::MAX)
}

#[async_trait]
impl VectorCollection for DuckdbCollection {
    fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    async fn upsert(&self, record: &VectorRecord) -> Result<(), DomainError> {
        let array_lit = self.vector_to_array_literal(record.embedding())?;
        let metadata = serde_json::to_string(record.metadata())?;
        // The array literal is inlined because FLOAT[N] parameters are not supported.
        let sql = format!(
            "INSERT OR REPLACE INTO \"{}\" (content_id, text, embedding, metadata) VALUES (?, ?, {}, ?)",
            self.namespace, array_lit
        );
        let content_id = record.content_id().to_string();
        let text = record.text().to_string();
        let table = self.namespace.clone();

        run_blocking(&self.conn, move |conn| {
            conn.execute(&sql, params![content_id, text, metadata])
                .map_err(|e| {
                    DomainError::storage(format!(
                        "Failed to insert {} into {}: {}",
                        content_id, table, e
                    ))
                })
                .map(|_| ())
        })
        .await?;

        debug!("Stored {} in {}", record.content_id(), self.namespace);
        Ok(())
    }

    async fn get(&self, content_id: &str) -> Result<Option<VectorRecord>, DomainError> {
        let sql = format!(
            "SELECT content_id, text, CAST(embedding AS VARCHAR), metadata FROM \"{}\" WHERE content_id = ?",
            self.namespace
        );
        let content_id = content_id.to_string();

        run_blocking(&self.conn, move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare get: {}", e)))?;
            let mut rows = stmt
                .query(params![content_id])
                .map_err(|e| DomainError::storage(format!("Failed to run get: {}", e)))?;

            match rows
                .next()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
            {
                Some(row) => record_from_row(row).map(Some),
                None => Ok(None),
            }
        })
        .await
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredRecord>, DomainError> {
        let array_lit = self.vector_to_array_literal(embedding)?;
        let sql = format!(
            "SELECT content_id, text, CAST(embedding AS VARCHAR), metadata, \
                {func}(embedding, {lit}) AS distance \
             FROM \"{ns}\" \
             ORDER BY distance \
             LIMIT ?",
            func = self.distance_function(),
            lit = array_lit,
            ns = self.namespace
        );
        let distance = self.distance;
        let limit = limit_param(k);

        run_blocking(&self.conn, move |conn| {
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| DomainError::storage(format!("Failed to prepare search: {}", e)))?;
            let mut rows = stmt
                .query(params![limit])
                .map_err(|e| DomainError::storage(format!("Failed to run search: {}", e)))?;

            let mut results = Vec::new();
            while let Some(row) = rows
                .next()
                .map_err(|e| DomainError::storage(format!("Failed to read row: {}", e)))?
            {
                let raw_distance: f32 = row
                    .get(4)
                    .map_err(|e| DomainError::storage(format!("Failed to read distance: {}", e)))?;
                results.push(ScoredRecord {
                    record: record_from_row(row)?,
                    score: distance.score(raw_distance),
                });
            }
            Ok(results)
        })
        .await
    }

    async fn delete(&self, content_id: &str) -> Result<bool, DomainError> {
        let sql = format!("DELETE FROM \"{}\" WHERE content_id = ?", self.namespace);
        let content_id = content_id.to_string();
        let table = self.namespace.clone();

        let removed = run_blocking(&self.conn, move |conn| {
            conn.execute(&sql, params![content_id]).map_err(|e| {
                DomainError::storage(format!(
                    "Failed to delete {} from {}: {}",
                    content_id, table, e
                ))
            })
        })
        .await?;
        Ok(removed > 0)
    }

    async fn count(&self) -> Result<u64, DomainError> {
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", self.namespace);
        let count: i64 = run_blocking(&self.conn, move |conn| {
            conn.query_row(&sql, [], |row| row.get(0))
                .map_err(|e| DomainError::storage(format!("Failed to count records: {}", e)))
        })
        .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::{CourseVectorService, VectorServiceConfig};
    use crate::connector::MockEmbedding;

    #[test]
    fn test_parse_array_text() {
        assert_eq!(parse_array_text("[0.5, -1.0, 2]").unwrap(), vec![0.5, -1.0, 2.0]);
        assert_eq!(parse_array_text("[]").unwrap(), Vec::<f32>::new());
        assert!(parse_array_text("0.5, 1.0").is_err());
        assert!(parse_array_text("[a, b]").is_err());
    }

    #[test]
    fn test_limit_param_saturates() {
        assert_eq!(limit_param(3), 3);
        assert_eq!(limit_param(usize::MAX), i64::MAX);
    }

    #[tokio::test]
    async fn test_array_literal_rejects_wrong_dimension() {
        let store = DuckdbVectorStore::in_memory().unwrap().with_dimensions(4);
        let collection = store.provision(&Namespace::for_course(1)).await.unwrap();

        let err = collection
            .upsert(&VectorRecord::new("a", "text", vec![1.0; 3], Metadata::new()))
            .await
            .unwrap_err();

        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_busy_connection_hits_storage_timeout() {
        let store = DuckdbVectorStore::in_memory().unwrap();
        let conn = Arc::clone(&store.conn);
        let service = CourseVectorService::with_config(
            Arc::new(store),
            Arc::new(MockEmbedding::new()),
            VectorServiceConfig {
                storage_timeout: Duration::from_millis(50),
                ..VectorServiceConfig::default()
            },
        );
        service.add(1, "a", "alpha", Metadata::new()).await.unwrap();

        // A long-running statement elsewhere keeps the connection busy.
        let guard = conn.lock().await;
        let started = std::time::Instant::now();
        let err = service.count(1).await.unwrap_err();
        drop(guard);

        assert!(err.is_storage_error());
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
