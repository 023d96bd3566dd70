use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::domain::{ChapterId, CourseId, EventEnvelope, EventKind};

use super::{ConnectionRegistry, DeliveryReport};

/// Typed course events, all delivered through [`ConnectionRegistry::send`].
#[derive(Clone)]
pub struct CourseNotifier {
    registry: Arc<ConnectionRegistry>,
}

impl CourseNotifier {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub async fn progress(&self, subscriber: &str, course_id: CourseId, progress: Value) -> DeliveryReport {
        self.emit(EventKind::CourseCreationProgress, subscriber, course_id, None, progress)
            .await
    }

    pub async fn chapter_created(
        &self,
        subscriber: &str,
        course_id: CourseId,
        chapter: Value,
    ) -> DeliveryReport {
        self.emit(EventKind::ChapterCreated, subscriber, course_id, None, chapter)
            .await
    }

    pub async fn chapter_updated(
        &self,
        subscriber: &str,
        course_id: CourseId,
        chapter: Value,
    ) -> DeliveryReport {
        self.emit(EventKind::ChapterUpdated, subscriber, course_id, None, chapter)
            .await
    }

    pub async fn questions_ready(
        &self,
        subscriber: &str,
        course_id: CourseId,
        chapter_id: ChapterId,
        questions: Value,
    ) -> DeliveryReport {
        self.emit(
            EventKind::QuestionsReady,
            subscriber,
            course_id,
            Some(chapter_id),
            questions,
        )
        .await
    }

    pub async fn course_completed(
        &self,
        subscriber: &str,
        course_id: CourseId,
        course: Value,
    ) -> DeliveryReport {
        self.emit(EventKind::CourseCompleted, subscriber, course_id, None, course)
            .await
    }

    pub async fn course_error(&self, subscriber: &str, course_id: CourseId, error: Value) -> DeliveryReport {
        self.emit(EventKind::CourseError, subscriber, course_id, None, error)
            .await
    }

    pub async fn broadcast(&self, course_id: CourseId, event_type: &str, data: Value) -> DeliveryReport {
        self.registry.broadcast(course_id, event_type, data).await
    }

    /// Sends an envelope with an arbitrary event name, used by the internal HTTP API.
    pub async fn publish(&self, subscriber: &str, envelope: &EventEnvelope) -> DeliveryReport {
        self.registry
            .send(envelope, subscriber, envelope.course_id)
            .await
    }

    async fn emit(
        &self,
        kind: EventKind,
        subscriber: &str,
        course_id: CourseId,
        chapter_id: Option<ChapterId>,
        data: Value,
    ) -> DeliveryReport {
        let mut envelope = EventEnvelope::of(kind, course_id, data);
        envelope.chapter_id = chapter_id;

        let report = self.registry.send(&envelope, subscriber, course_id).await;
        debug!(
            "{} for user {}, course {} reached {} channels",
            kind,
            subscriber,
            course_id,
            report.delivered_count()
        );
        report
    }
}
