use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::application::EmbeddingService;
use crate::domain::{DomainError, EmbeddingConfig, EMBEDDING_DIMENSIONS};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "models/text-embedding-004";
const API_VERSION: &str = "v1beta";
const TASK_TYPE: &str = "RETRIEVAL_DOCUMENT";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Values,
}

#[derive(Deserialize)]
struct Values {
    values: Vec<f32>,
}

/// Embedding provider backed by the Google Generative Language `embedContent` endpoint.
///
/// | Variable                | Default                                       |
/// |-------------------------|-----------------------------------------------|
/// | `GOOGLE_API_KEY`        | required                                      |
/// | `GEMINI_BASE_URL`       | `https://generativelanguage.googleapis.com`   |
/// | `GEMINI_EMBEDDING_MODEL`| `models/text-embedding-004`                   |
pub struct GeminiEmbedding {
    client: reqwest::Client,
    api_key: String,
    url: String,
    config: EmbeddingConfig,
}

impl GeminiEmbedding {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let model = normalize_model(&model.into());
        let base: String = base_url.into();
        let url = format!(
            "{}/{}/{}:embedContent",
            base.trim_end_matches('/'),
            API_VERSION,
            model
        );

        Self {
            client: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            url,
            config: EmbeddingConfig::new(model, EMBEDDING_DIMENSIONS),
        }
    }

    pub fn from_env(timeout: Duration) -> Result<Self, DomainError> {
        let key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| DomainError::embedding("GOOGLE_API_KEY is not set"))?;
        let model =
            std::env::var("GEMINI_EMBEDDING_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let base = std::env::var("GEMINI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::new(key, model, base, timeout))
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }
}

fn normalize_model(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[async_trait]
impl EmbeddingService for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, DomainError> {
        let request = EmbedRequest {
            model: self.config.model_name(),
            content: Content {
                parts: [Part { text }],
            },
            task_type: TASK_TYPE,
        };

        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| DomainError::embedding(format!("Gemini request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini embedding API returned {status}: {body}");
            return Err(DomainError::embedding(format!(
                "Gemini embedding API returned {status}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| DomainError::embedding(format!("Failed to parse Gemini response: {e}")))?;

        debug!(
            "Gemini returned embedding with {} dimensions",
            parsed.embedding.values.len()
        );
        Ok(parsed.embedding.values)
    }

    fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}
