use anyhow::{bail, Result};

use super::super::Container;

pub struct HealthController<'a> {
    container: &'a Container,
}

impl<'a> HealthController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Fails when the vector store or the embedding provider is unusable.
    pub async fn health(&self) -> Result<String> {
        let store = if self.container.memory_storage() {
            "in-memory"
        } else {
            "duckdb"
        };

        if !self.container.vector_service().health_check().await {
            bail!("Vector service is unhealthy (store: {})", store);
        }

        Ok(format!(
            "Vector service healthy\n  Store:    {}\n  Data Dir: {}",
            store,
            self.container.data_dir()
        ))
    }
}
