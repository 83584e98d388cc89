//! Typed, topic-based publish/subscribe bus for perception output.
//!
//! Uses [`tokio::sync::broadcast`] channels so that every subscriber receives
//! every message and a slow subscriber never blocks the session.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::Announcements`] | Arbitrated alerts, at most one per frame |
//! | [`Topic::Detections`] | Every [`DetectionState`], one per processed frame |

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;
use wayfinder_hal::AnnouncementSink;
use wayfinder_types::{Announcement, DetectionState, PerceptionError};

/// Default channel capacity (number of buffered events before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 64;

/// Routing lanes on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Alerts destined for the user.
    Announcements,
    /// Raw per-frame perception snapshots.
    Detections,
}

/// What an event carries.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Announcement(Announcement),
    Detection(DetectionState),
}

/// Envelope for everything published on the bus.
#[derive(Debug, Clone, PartialEq)]
pub struct PerceptionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Publisher identity, typically the session id.
    pub source: String,
    pub payload: EventPayload,
}

impl PerceptionEvent {
    fn new(source: &str, timestamp: DateTime<Utc>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp,
            source: source.to_string(),
            payload,
        }
    }
}

/// Shared bus. Clone it cheaply; all clones share the same channels.
#[derive(Clone, Debug)]
pub struct PerceptionBus {
    announcements: broadcast::Sender<PerceptionEvent>,
    detections: broadcast::Sender<PerceptionEvent>,
}

impl PerceptionBus {
    /// Create a new bus; `capacity` applies to each topic independently.
    pub fn new(capacity: usize) -> Self {
        let (announcements, _) = broadcast::channel(capacity);
        let (detections, _) = broadcast::channel(capacity);
        Self {
            announcements,
            detections,
        }
    }

    /// Publish `event` on `topic`.
    ///
    /// Returns the number of receivers handed the event, or
    /// [`PerceptionError::Channel`] when nobody is listening.
    pub fn publish_to(&self, topic: Topic, event: PerceptionEvent) -> Result<usize, PerceptionError> {
        self.sender(topic)
            .send(event)
            .map_err(|_| PerceptionError::Channel(format!("No subscribers for topic {topic:?}")))
    }

    pub fn publish_announcement(
        &self,
        source: &str,
        announcement: Announcement,
    ) -> Result<usize, PerceptionError> {
        let event = PerceptionEvent::new(
            source,
            announcement.timestamp,
            EventPayload::Announcement(announcement),
        );
        self.publish_to(Topic::Announcements, event)
    }

    pub fn publish_detection(
        &self,
        source: &str,
        detection: DetectionState,
    ) -> Result<usize, PerceptionError> {
        let event = PerceptionEvent::new(source, detection.timestamp(), EventPayload::Detection(detection));
        self.publish_to(Topic::Detections, event)
    }

    /// Subscribe to one topic.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.sender(topic).receiver_count()
    }

    fn sender(&self, topic: Topic) -> &broadcast::Sender<PerceptionEvent> {
        match topic {
            Topic::Announcements => &self.announcements,
            Topic::Detections => &self.detections,
        }
    }
}

impl Default for PerceptionBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// An async receiver bound to a single [`Topic`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<PerceptionEvent>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// `Err(Lagged(n))` means this subscriber fell behind and `n` events were
    /// dropped; `Err(Closed)` means every publisher is gone.
    pub async fn recv(&mut self) -> Result<PerceptionEvent, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Like [`recv`][Self::recv] but skips over lag and returns `None` only
    /// once the bus is closed.
    pub async fn next(&mut self) -> Option<PerceptionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

// ---------------------------------------------------------------------------
// Sink adapter
// ---------------------------------------------------------------------------

/// [`AnnouncementSink`] that publishes on [`Topic::Announcements`].
#[derive(Clone, Debug)]
pub struct BusSink {
    bus: PerceptionBus,
    source: String,
}

impl BusSink {
    pub fn new(bus: PerceptionBus, source: impl Into<String>) -> Self {
        Self {
            bus,
            source: source.into(),
        }
    }
}

impl AnnouncementSink for BusSink {
    fn announce(&self, announcement: Announcement) {
        if let Err(e) = self.bus.publish_announcement(&self.source, announcement) {
            debug!(error = %e, "announcement not delivered");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfinder_types::{AlertCategory, PathDirection, Priority, WallDirection};

    fn announcement(message: &str) -> Announcement {
        Announcement {
            category: AlertCategory::Obstacle,
            message: message.to_string(),
            priority: Priority::Urgent,
            timestamp: Utc::now(),
        }
    }

    fn detection() -> DetectionState {
        DetectionState::new(Utc::now(), 900.0, true, WallDirection::Left, PathDirection::Right)
    }

    #[tokio::test]
    async fn announcement_reaches_every_subscriber() -> Result<(), Box<dyn std::error::Error>> {
        let bus = PerceptionBus::default();
        let mut rx1 = bus.subscribe_to(Topic::Announcements);
        let mut rx2 = bus.subscribe_to(Topic::Announcements);

        let sent = bus.publish_announcement("session-1", announcement("Obstacle ahead"))?;
        assert_eq!(sent, 2);

        let a = rx1.recv().await?;
        let b = rx2.recv().await?;
        assert_eq!(a.id, b.id);
        assert_eq!(a.source, "session-1");
        assert!(matches!(a.payload, EventPayload::Announcement(ref x) if x.message == "Obstacle ahead"));
        Ok(())
    }

    #[tokio::test]
    async fn topics_are_isolated() -> Result<(), Box<dyn std::error::Error>> {
        let bus = PerceptionBus::default();
        let mut alerts = bus.subscribe_to(Topic::Announcements);
        let _detections = bus.subscribe_to(Topic::Detections);

        bus.publish_detection("session-1", detection())?;

        let result = tokio::time::timeout(std::time::Duration::from_millis(50), alerts.recv()).await;
        assert!(result.is_err(), "announcement subscriber must not see detections");
        Ok(())
    }

    #[tokio::test]
    async fn detection_event_uses_snapshot_timestamp() -> Result<(), Box<dyn std::error::Error>> {
        let bus = PerceptionBus::default();
        let mut rx = bus.subscribe_to(Topic::Detections);
        let state = detection();
        bus.publish_detection("s", state.clone())?;
        let event = rx.recv().await?;
        assert_eq!(event.timestamp, state.timestamp());
        assert_eq!(event.payload, EventPayload::Detection(state));
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_channel_error() {
        let bus = PerceptionBus::default();
        let err = bus.publish_announcement("s", announcement("x")).unwrap_err();
        assert!(matches!(err, PerceptionError::Channel(_)));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn bus_sink_publishes_and_tolerates_no_listeners() {
        let bus = PerceptionBus::default();
        let sink = BusSink::new(bus.clone(), "sink");
        // Nobody listening yet: dropped silently.
        sink.announce(announcement("lost"));

        let mut rx = bus.subscribe_to(Topic::Announcements);
        sink.announce(announcement("heard"));
        let event = rx.next().await.expect("bus open");
        assert!(matches!(event.payload, EventPayload::Announcement(ref a) if a.message == "heard"));
    }

    #[tokio::test]
    async fn slow_subscriber_lags_then_continues() {
        let bus = PerceptionBus::new(4);
        let mut slow = bus.subscribe_to(Topic::Detections);
        for _ in 0..32 {
            let _ = bus.publish_detection("flood", detection());
        }
        assert!(matches!(slow.recv().await, Err(broadcast::error::RecvError::Lagged(_))));
        assert!(slow.next().await.is_some());
    }
}
