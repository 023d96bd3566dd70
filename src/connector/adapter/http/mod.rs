//! Internal HTTP API and the `/ws/{course_id}` WebSocket endpoint.

mod error;
mod socket;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tracing::info;

use crate::application::{CourseNotifier, CourseVectorService, DeliveryReport};
use crate::domain::{ChapterId, CourseId, EventEnvelope, Metadata, SearchQuery, SearchResult};

pub use error::ApiError;

pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Shared state handed to every route through axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    vectors: Arc<CourseVectorService>,
    notifier: CourseNotifier,
    auth_timeout: Duration,
}

impl AppState {
    pub fn new(vectors: Arc<CourseVectorService>, notifier: CourseNotifier) -> Self {
        Self {
            vectors,
            notifier,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
        }
    }

    /// How long a fresh socket may wait before sending its auth message.
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws/{course_id}", get(socket::upgrade))
        .route("/courses/{course_id}/broadcast", post(broadcast))
        .route(
            "/courses/{course_id}/subscribers/{user_id}/events",
            post(publish_event),
        )
        .route(
            "/courses/{course_id}/content/{content_id}",
            put(put_content).delete(delete_content),
        )
        .route("/courses/{course_id}/search", post(search))
        .with_state(state)
}

/// Serves until the listener fails or ctrl-c is received.
pub async fn serve(listener: TcpListener, state: AppState) -> anyhow::Result<()> {
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    info!("Server stopped");
    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    vector_store: bool,
    subscribers: usize,
    channels: usize,
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let healthy = state.vectors.health_check().await;
    let registry = state.notifier.registry();
    let body = HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        vector_store: healthy,
        subscribers: registry.subscriber_count().await,
        channels: registry.channel_count().await,
    };
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Deserialize)]
struct BroadcastRequest {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

async fn broadcast(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    payload: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<DeliveryReport>, ApiError> {
    let Json(request) = payload?;
    if request.event_type.trim().is_empty() {
        return Err(ApiError::bad_request("Event type must not be empty"));
    }

    let report = state
        .notifier
        .broadcast(course_id, &request.event_type, request.data)
        .await;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct EventRequest {
    #[serde(rename = "type")]
    event_type: String,
    chapter_id: Option<ChapterId>,
    #[serde(default)]
    data: Value,
}

async fn publish_event(
    State(state): State<AppState>,
    Path((course_id, user_id)): Path<(CourseId, String)>,
    payload: Result<Json<EventRequest>, JsonRejection>,
) -> Result<Json<DeliveryReport>, ApiError> {
    let Json(request) = payload?;
    if request.event_type.trim().is_empty() {
        return Err(ApiError::bad_request("Event type must not be empty"));
    }

    let mut envelope = EventEnvelope::new(request.event_type, course_id, request.data);
    if let Some(chapter_id) = request.chapter_id {
        envelope = envelope.with_chapter(chapter_id);
    }

    Ok(Json(state.notifier.publish(&user_id, &envelope).await))
}

#[derive(Deserialize)]
struct ContentRequest {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Serialize)]
struct ContentResponse {
    course_id: CourseId,
    content_id: String,
    namespace: String,
    replaced: bool,
}

/// Adds the content, or replaces it when the id is already stored.
async fn put_content(
    State(state): State<AppState>,
    Path((course_id, content_id)): Path<(CourseId, String)>,
    payload: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Json<ContentResponse>, ApiError> {
    let Json(request) = payload?;

    let replaced = state.vectors.get(course_id, &content_id).await?.is_some();
    if replaced {
        state
            .vectors
            .update(course_id, &content_id, &request.text, request.metadata)
            .await?;
    } else {
        state
            .vectors
            .add(course_id, &content_id, &request.text, request.metadata)
            .await?;
    }

    Ok(Json(ContentResponse {
        course_id,
        namespace: state.vectors.namespace_for(course_id).to_string(),
        content_id,
        replaced,
    }))
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_content(
    State(state): State<AppState>,
    Path((course_id, content_id)): Path<(CourseId, String)>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = state.vectors.delete(course_id, &content_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default = "default_search_limit")]
    k: usize,
    filter: Option<Metadata>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

async fn search(
    State(state): State<AppState>,
    Path(course_id): Path<CourseId>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload?;

    let mut query = SearchQuery::new(request.query).with_limit(request.k);
    if let Some(filter) = request.filter {
        query = query.with_filter(filter);
    }

    let results = state.vectors.search(course_id, &query).await?;
    Ok(Json(SearchResponse { results }))
}
