use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::{Channel, ChannelId};
use crate::domain::DomainError;

/// Policy violation, sent when the auth handshake fails.
pub const CLOSE_POLICY_VIOLATION: u16 = 1008;

/// Write half of an accepted WebSocket. The read half stays with the connection task.
pub struct WsChannel {
    id: ChannelId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsChannel {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Channel for WsChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    async fn send(&self, payload: &str) -> Result<(), DomainError> {
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(payload.to_owned().into()))
            .await
            .map_err(|e| DomainError::delivery(format!("channel {}: {}", self.id, e)))
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), DomainError> {
        let mut sink = self.sink.lock().await;
        let frame = CloseFrame {
            code,
            reason: reason.to_owned().into(),
        };
        sink.send(Message::Close(Some(frame)))
            .await
            .map_err(|e| DomainError::delivery(format!("channel {}: {}", self.id, e)))
    }
}
