use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use coursecast::{
    Channel, ChannelId, ConnectionRegistry, CourseNotifier, DomainError, EventEnvelope,
};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

struct RecordingChannel {
    id: ChannelId,
    received: Mutex<Vec<String>>,
    broken: AtomicBool,
}

impl RecordingChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            received: Mutex::new(Vec::new()),
            broken: AtomicBool::new(false),
        })
    }

    fn break_pipe(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    async fn messages(&self) -> Vec<Value> {
        self.received
            .lock()
            .await
            .iter()
            .map(|text| serde_json::from_str(text).expect("valid json"))
            .collect()
    }

    async fn raw(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    async fn send(&self, payload: &str) -> Result<(), DomainError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(DomainError::delivery("broken pipe"));
        }
        self.received.lock().await.push(payload.to_string());
        Ok(())
    }

    async fn close(&self, _code: u16, _reason: &str) -> Result<(), DomainError> {
        Ok(())
    }
}

fn notifier() -> CourseNotifier {
    CourseNotifier::new(Arc::new(ConnectionRegistry::new()))
}

#[tokio::test]
async fn two_channels_for_one_subscriber_scenario() {
    let registry = ConnectionRegistry::new();
    let c1 = RecordingChannel::new();
    let c2 = RecordingChannel::new();

    registry.connect(c1.clone(), "u1", 42).await;
    registry.connect(c2.clone(), "u1", 42).await;

    let message = json!({"type": "progress", "data": {"pct": 50}});
    let report = registry.send(&message, "u1", 42).await;
    assert_eq!(report.delivered_count(), 2);

    let c1_raw = c1.raw().await;
    assert_eq!(c1_raw, c2.raw().await);
    assert_eq!(c1_raw.len(), 1);

    assert!(registry.disconnect(c1.id(), "u1", 42).await);
    assert_eq!(registry.channels_for("u1", 42).await, vec![c2.id()]);

    assert!(registry.disconnect(c2.id(), "u1", 42).await);
    assert!(registry.channels_for("u1", 42).await.is_empty());
    assert!(!registry.topology().await.contains_key("u1"));
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn disconnecting_last_channel_keeps_other_courses() {
    let registry = ConnectionRegistry::new();
    let c1 = RecordingChannel::new();
    let c2 = RecordingChannel::new();

    registry.connect(c1.clone(), "u1", 42).await;
    registry.connect(c2.clone(), "u1", 43).await;
    registry.disconnect(c1.id(), "u1", 42).await;

    let topology = registry.topology().await;
    let courses = topology.get("u1").expect("u1 still subscribed");
    assert!(!courses.contains_key(&42));
    assert_eq!(courses.get(&43), Some(&1));
}

#[tokio::test]
async fn send_prunes_only_the_failing_channel() {
    let registry = ConnectionRegistry::new();
    let healthy = RecordingChannel::new();
    let broken = RecordingChannel::new();
    broken.break_pipe();

    registry.connect(healthy.clone(), "u1", 42).await;
    registry.connect(broken.clone(), "u1", 42).await;

    let report = registry.send(&json!({"type": "ping"}), "u1", 42).await;

    assert_eq!(report.delivered, vec![healthy.id()]);
    assert_eq!(report.pruned, vec![broken.id()]);
    assert_eq!(registry.channels_for("u1", 42).await, vec![healthy.id()]);
    assert_eq!(healthy.messages().await.len(), 1);
}

#[tokio::test]
async fn notifier_emits_typed_envelopes() {
    let notifier = notifier();
    let channel = RecordingChannel::new();
    notifier.registry().connect(channel.clone(), "u1", 42).await;

    notifier.progress("u1", 42, json!({"pct": 10})).await;
    notifier.chapter_created("u1", 42, json!({"id": 3, "title": "Graphs"})).await;
    notifier.chapter_updated("u1", 42, json!({"id": 3, "title": "Graphs II"})).await;
    notifier.questions_ready("u1", 42, 3, json!({"questions_count": 4})).await;
    notifier.course_completed("u1", 42, json!({"status": "finished"})).await;
    notifier.course_error("u1", 42, json!({"message": "model overloaded"})).await;

    let raw = channel.raw().await;
    assert_eq!(
        raw[0],
        r#"{"type":"course_creation_progress","course_id":42,"data":{"pct":10}}"#
    );
    assert_eq!(
        raw[3],
        r#"{"type":"questions_ready","course_id":42,"chapter_id":3,"data":{"questions_count":4}}"#
    );

    let types: Vec<String> = channel
        .messages()
        .await
        .iter()
        .map(|m| m["type"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(
        types,
        vec![
            "course_creation_progress",
            "chapter_created",
            "chapter_updated",
            "questions_ready",
            "course_completed",
            "course_error",
        ]
    );
}

#[tokio::test]
async fn notifier_to_unknown_subscriber_is_a_noop() {
    let notifier = notifier();

    let report = notifier.progress("nobody", 1, json!({"pct": 1})).await;

    assert_eq!(report.delivered_count(), 0);
    assert_eq!(report.pruned_count(), 0);
    assert!(notifier.registry().is_empty().await);
}

#[tokio::test]
async fn broadcast_reaches_only_the_target_course() {
    let notifier = notifier();
    let a = RecordingChannel::new();
    let b = RecordingChannel::new();
    let other = RecordingChannel::new();

    notifier.registry().connect(a.clone(), "alice", 7).await;
    notifier.registry().connect(b.clone(), "bob", 7).await;
    notifier.registry().connect(other.clone(), "carol", 8).await;

    let report = notifier
        .broadcast(7, "announcement", json!({"text": "new chapter"}))
        .await;

    assert_eq!(report.delivered_count(), 2);
    assert!(other.raw().await.is_empty());

    let received = a.messages().await;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["type"], "announcement");
    assert_eq!(received[0]["course_id"], 7);
    assert_eq!(received[0]["data"]["text"], "new chapter");
    assert_eq!(b.messages().await, received);
}

#[tokio::test]
async fn publish_carries_custom_event_names() {
    let notifier = notifier();
    let channel = RecordingChannel::new();
    notifier.registry().connect(channel.clone(), "u9", 5).await;

    let envelope = EventEnvelope::new("chapter_regenerating", 5, json!({})).with_chapter(2);
    let report = notifier.publish("u9", &envelope).await;

    assert_eq!(report.delivered_count(), 1);
    assert_eq!(
        channel.raw().await,
        vec![r#"{"type":"chapter_regenerating","course_id":5,"chapter_id":2,"data":{}}"#]
    );
}
