use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::application::{Channel, ChannelId};
use crate::domain::{CourseId, DomainError, EventEnvelope};

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Upper bound for a single channel delivery. Exceeding it marks the channel dead.
    pub send_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }
}

/// Outcome of a `send` or `broadcast`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub delivered: Vec<ChannelId>,
    pub pruned: Vec<ChannelId>,
}

impl DeliveryReport {
    pub fn merge(&mut self, other: DeliveryReport) {
        self.delivered.extend(other.delivered);
        self.pruned.extend(other.pruned);
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    pub fn pruned_count(&self) -> usize {
        self.pruned.len()
    }
}

type ChannelSet = HashMap<ChannelId, Arc<dyn Channel>>;

#[derive(Default)]
struct RegistryState {
    subscribers: HashMap<String, HashMap<CourseId, ChannelSet>>,
    locations: HashMap<ChannelId, (String, CourseId)>,
}

impl RegistryState {
    /// Returns false when the channel was already registered under this key.
    fn insert(&mut self, channel: Arc<dyn Channel>, subscriber: &str, course_id: CourseId) -> bool {
        let id = channel.id();

        if let Some((current_subscriber, current_course)) = self.locations.get(&id).cloned() {
            if current_subscriber == subscriber && current_course == course_id {
                return false;
            }
            self.remove(id, &current_subscriber, current_course);
        }

        self.subscribers
            .entry(subscriber.to_string())
            .or_default()
            .entry(course_id)
            .or_default()
            .insert(id, channel);
        self.locations.insert(id, (subscriber.to_string(), course_id));
        true
    }

    /// The only removal path. Drops the course entry once its set is empty and
    /// the subscriber entry once it has no courses left.
    fn remove(&mut self, id: ChannelId, subscriber: &str, course_id: CourseId) -> bool {
        let Some(courses) = self.subscribers.get_mut(subscriber) else {
            return false;
        };

        let removed = match courses.get_mut(&course_id) {
            Some(channels) => {
                let removed = channels.remove(&id).is_some();
                if channels.is_empty() {
                    courses.remove(&course_id);
                }
                removed
            }
            None => false,
        };

        if courses.is_empty() {
            self.subscribers.remove(subscriber);
        }
        if removed {
            self.locations.remove(&id);
        }
        removed
    }

    fn snapshot(&self, subscriber: &str, course_id: CourseId) -> Vec<Arc<dyn Channel>> {
        self.subscribers
            .get(subscriber)
            .and_then(|courses| courses.get(&course_id))
            .map(|channels| channels.values().cloned().collect())
            .unwrap_or_default()
    }

    fn subscribers_of(&self, course_id: CourseId) -> Vec<String> {
        self.subscribers
            .iter()
            .filter(|(_, courses)| courses.contains_key(&course_id))
            .map(|(subscriber, _)| subscriber.clone())
            .collect()
    }
}

/// Routes messages to the live channels of each (subscriber, course) pair.
///
/// The lock is only held for map lookups and mutations, never across a
/// channel send, so one slow client cannot stall registrations.
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
    config: RegistryConfig,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            config,
        }
    }

    /// Registers an already accepted channel under (subscriber, course).
    ///
    /// Registering the same channel twice under one key stores it once. A
    /// channel registered under another key is moved.
    pub async fn connect(&self, channel: Arc<dyn Channel>, subscriber: &str, course_id: CourseId) {
        let id = channel.id();
        let inserted = self.state.write().await.insert(channel, subscriber, course_id);

        if inserted {
            info!(
                "Channel {} connected for user {}, course {}",
                id, subscriber, course_id
            );
        } else {
            debug!(
                "Channel {} already registered for user {}, course {}",
                id, subscriber, course_id
            );
        }
    }

    /// Removes the channel from the key. Returns whether anything was removed.
    pub async fn disconnect(&self, channel_id: ChannelId, subscriber: &str, course_id: CourseId) -> bool {
        let removed = self
            .state
            .write()
            .await
            .remove(channel_id, subscriber, course_id);

        if removed {
            info!(
                "Channel {} disconnected for user {}, course {}",
                channel_id, subscriber, course_id
            );
        }
        removed
    }

    /// Delivers `message` to every channel registered under (subscriber, course).
    ///
    /// Channels that fail or time out are pruned; failures never reach the caller.
    pub async fn send<M>(&self, message: &M, subscriber: &str, course_id: CourseId) -> DeliveryReport
    where
        M: Serialize + ?Sized,
    {
        match serde_json::to_string(message) {
            Ok(payload) => self.send_text(&payload, subscriber, course_id).await,
            Err(e) => {
                error!(
                    "Dropping message for user {}, course {}: {}",
                    subscriber, course_id, e
                );
                DeliveryReport::default()
            }
        }
    }

    /// Sends `{type, course_id, data}` to every subscriber holding a live entry for the course.
    pub async fn broadcast(&self, course_id: CourseId, event_type: &str, data: Value) -> DeliveryReport {
        let envelope = EventEnvelope::new(event_type, course_id, data);
        let payload = match serde_json::to_string(&envelope) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Dropping broadcast for course {}: {}", course_id, e);
                return DeliveryReport::default();
            }
        };

        let subscribers = self.state.read().await.subscribers_of(course_id);
        debug!(
            "Broadcasting {} for course {} to {} subscribers",
            event_type,
            course_id,
            subscribers.len()
        );

        let reports = join_all(
            subscribers
                .iter()
                .map(|subscriber| self.send_text(&payload, subscriber, course_id)),
        )
        .await;

        let mut merged = DeliveryReport::default();
        for report in reports {
            merged.merge(report);
        }
        merged
    }

    async fn send_text(&self, payload: &str, subscriber: &str, course_id: CourseId) -> DeliveryReport {
        let channels = self.state.read().await.snapshot(subscriber, course_id);
        if channels.is_empty() {
            debug!("No live channels for user {}, course {}", subscriber, course_id);
            return DeliveryReport::default();
        }

        let outcomes = deliver_all(&channels, payload, self.config.send_timeout).await;
        self.settle(outcomes, subscriber, course_id).await
    }

    /// Splits per-channel outcomes and prunes all failed channels in one write.
    async fn settle(
        &self,
        outcomes: Vec<(ChannelId, Result<(), DomainError>)>,
        subscriber: &str,
        course_id: CourseId,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut dead = Vec::new();

        for (id, outcome) in outcomes {
            match outcome {
                Ok(()) => report.delivered.push(id),
                Err(e) => {
                    warn!(
                        "Failed to send message to channel {} (user {}, course {}): {}",
                        id, subscriber, course_id, e
                    );
                    dead.push(id);
                }
            }
        }

        if !dead.is_empty() {
            let mut state = self.state.write().await;
            for id in dead {
                if state.remove(id, subscriber, course_id) {
                    report.pruned.push(id);
                }
            }
        }

        report
    }

    pub async fn subscriber_count(&self) -> usize {
        self.state.read().await.subscribers.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.state.read().await.locations.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.subscribers.is_empty()
    }

    /// Channel ids registered under the key, sorted.
    pub async fn channels_for(&self, subscriber: &str, course_id: CourseId) -> Vec<ChannelId> {
        let mut ids: Vec<ChannelId> = self
            .state
            .read()
            .await
            .snapshot(subscriber, course_id)
            .iter()
            .map(|channel| channel.id())
            .collect();
        ids.sort();
        ids
    }

    pub async fn location_of(&self, channel_id: ChannelId) -> Option<(String, CourseId)> {
        self.state.read().await.locations.get(&channel_id).cloned()
    }

    /// Sorted snapshot of subscriber -> course -> number of channels.
    pub async fn topology(&self) -> BTreeMap<String, BTreeMap<CourseId, usize>> {
        let state = self.state.read().await;
        state
            .subscribers
            .iter()
            .map(|(subscriber, courses)| {
                let counts = courses
                    .iter()
                    .map(|(course_id, channels)| (*course_id, channels.len()))
                    .collect();
                (subscriber.clone(), counts)
            })
            .collect()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Attempts delivery to every channel concurrently and reports each result.
pub async fn deliver_all(
    channels: &[Arc<dyn Channel>],
    payload: &str,
    send_timeout: Duration,
) -> Vec<(ChannelId, Result<(), DomainError>)> {
    join_all(channels.iter().map(|channel| async move {
        let outcome = match tokio::time::timeout(send_timeout, channel.send(payload)).await {
            Ok(result) => result,
            Err(_) => Err(DomainError::delivery(format!(
                "send timed out after {}ms",
                send_timeout.as_millis()
            ))),
        };
        (channel.id(), outcome)
    }))
    .await
}
