use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::application::Channel;
use crate::domain::{parse_auth_message, ControlMessage, CourseId, DomainError};

use super::super::{WsChannel, CLOSE_POLICY_VIOLATION};
use super::AppState;

pub(super) async fn upgrade(
    ws: WebSocketUpgrade,
    Path(course_id): Path<CourseId>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, course_id, state))
}

/// Runs one connection: auth handshake, registration, then reads until the client leaves.
async fn handle_socket(socket: WebSocket, course_id: CourseId, state: AppState) {
    let (sink, mut stream) = socket.split();
    let channel = Arc::new(WsChannel::new(sink));

    let subscriber = match authenticate(&mut stream, state.auth_timeout).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            warn!("Rejected WebSocket for course {}: {}", course_id, e);
            reject(&channel, &e).await;
            return;
        }
    };

    let registry = state.notifier.registry();
    registry
        .connect(channel.clone() as Arc<dyn Channel>, &subscriber, course_id)
        .await;

    let ack = ControlMessage::AuthSuccess { course_id };
    let acked = match serde_json::to_string(&ack) {
        Ok(text) => channel.send(&text).await.is_ok(),
        Err(_) => false,
    };
    if !acked {
        registry.disconnect(channel.id(), &subscriber, course_id).await;
        return;
    }
    info!(
        "User {} subscribed to course {} (channel {})",
        subscriber,
        course_id,
        channel.id()
    );

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("Read error on channel {}: {}", channel.id(), e);
                break;
            }
        }
    }

    registry.disconnect(channel.id(), &subscriber, course_id).await;
    info!(
        "User {} left course {} (channel {})",
        subscriber,
        course_id,
        channel.id()
    );
}

async fn authenticate(
    stream: &mut SplitStream<WebSocket>,
    timeout: Duration,
) -> Result<String, DomainError> {
    let text = tokio::time::timeout(timeout, next_text(stream))
        .await
        .map_err(|_| DomainError::invalid_input("Authentication timed out"))??;
    parse_auth_message(&text)
}

async fn next_text(stream: &mut SplitStream<WebSocket>) -> Result<String, DomainError> {
    while let Some(frame) = stream.next().await {
        let frame = frame.map_err(|e| DomainError::invalid_input(format!("Read failed: {}", e)))?;
        match frame {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Binary(_) => {
                return Err(DomainError::invalid_input("Expected a text auth message"))
            }
            Message::Close(_) => break,
        }
    }
    Err(DomainError::invalid_input(
        "Connection closed before authentication",
    ))
}

async fn reject(channel: &WsChannel, err: &DomainError) {
    let message = ControlMessage::Error {
        message: err.to_string(),
    };
    if let Ok(text) = serde_json::to_string(&message) {
        let _ = channel.send(&text).await;
    }
    let _ = channel
        .close(CLOSE_POLICY_VIOLATION, "authentication failed")
        .await;
}
