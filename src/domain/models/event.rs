use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ChapterId, CourseId};
use crate::domain::DomainError;

/// Event names understood by the course frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CourseCreationProgress,
    ChapterCreated,
    ChapterUpdated,
    QuestionsReady,
    CourseCompleted,
    CourseError,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CourseCreationProgress => "course_creation_progress",
            EventKind::ChapterCreated => "chapter_created",
            EventKind::ChapterUpdated => "chapter_updated",
            EventKind::QuestionsReady => "questions_ready",
            EventKind::CourseCompleted => "course_completed",
            EventKind::CourseError => "course_error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape delivered over a channel.
///
/// Serialized field order is `type`, `course_id`, `chapter_id` (only when set), `data`.
/// Existing consumers depend on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub course_id: CourseId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<ChapterId>,
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(event_type: impl Into<String>, course_id: CourseId, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            course_id,
            chapter_id: None,
            data,
        }
    }

    pub fn of(kind: EventKind, course_id: CourseId, data: Value) -> Self {
        Self::new(kind.as_str(), course_id, data)
    }

    pub fn with_chapter(mut self, chapter_id: ChapterId) -> Self {
        self.chapter_id = Some(chapter_id);
        self
    }
}

/// Messages the server sends during the WebSocket handshake.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    AuthSuccess { course_id: CourseId },
    Error { message: String },
}

#[derive(Deserialize)]
struct AuthRequest {
    #[serde(rename = "type")]
    kind: String,
    user_id: Option<Value>,
}

/// Parses the first client frame, `{"type":"auth","user_id":...}`, into a subscriber id.
///
/// Numeric user ids are accepted and rendered as strings.
pub fn parse_auth_message(text: &str) -> Result<String, DomainError> {
    let request: AuthRequest = serde_json::from_str(text)
        .map_err(|e| DomainError::invalid_input(format!("Malformed auth message: {}", e)))?;

    if request.kind != "auth" {
        return Err(DomainError::invalid_input(format!(
            "Expected auth message, got '{}'",
            request.kind
        )));
    }

    match request.user_id {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(DomainError::invalid_input("Auth message is missing user_id")),
    }
}
