use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::DomainError;

pub type ChannelId = Uuid;

/// An open duplex connection to one client.
///
/// Implementors only need to move text frames; the registry serializes
/// messages once and hands every channel the same payload.
#[async_trait]
pub trait Channel: Send + Sync {
    fn id(&self) -> ChannelId;

    async fn send(&self, payload: &str) -> Result<(), DomainError>;

    async fn close(&self, code: u16, reason: &str) -> Result<(), DomainError>;
}
