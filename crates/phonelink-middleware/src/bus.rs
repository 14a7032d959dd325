//! Typed, topic-based publish/subscribe event bus.
//!
//! Uses [`tokio::sync::broadcast`] channels so that every subscriber receives
//! every message on its topic without any single subscriber blocking the
//! others. A slow subscriber observes `Lagged` instead of stalling the
//! publisher, which keeps the transport receive loop free of backpressure
//! from downstream consumers.
//!
//! # Topics
//!
//! | Topic | Traffic |
//! |---|---|
//! | [`Topic::Imu`] | Inertial messages (m/s², rad/s, quaternion) |
//! | [`Topic::Gps`] | Position fixes |
//! | [`Topic::Battery`] | Battery state |
//! | [`Topic::Motion`] | Device-motion twists |
//! | [`Topic::Orientation`] | Standalone orientation quaternions |
//! | [`Topic::Camera`] | Compressed camera frames |
//! | [`Topic::Diagnostics`] | Health records |
//!
//! Every published event is additionally mirrored onto a *firehose* channel
//! ([`EventBus::subscribe_all`]) consumed by the WebSocket egress.

use phonelink_types::{BridgeError, Event, NormalizedMessage};
use tokio::sync::broadcast;

/// Default per-channel capacity (buffered events before old ones are dropped
/// for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Routing lanes on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Imu,
    Gps,
    Battery,
    Motion,
    Orientation,
    Camera,
    Diagnostics,
}

impl Topic {
    /// The lane a message variant is routed to.
    pub fn for_message(message: &NormalizedMessage) -> Self {
        match message {
            NormalizedMessage::Imu(_) => Topic::Imu,
            NormalizedMessage::GpsFix(_) => Topic::Gps,
            NormalizedMessage::Battery(_) => Topic::Battery,
            NormalizedMessage::Motion(_) => Topic::Motion,
            NormalizedMessage::Orientation(_) => Topic::Orientation,
            NormalizedMessage::Camera(_) => Topic::Camera,
            NormalizedMessage::Health(_) => Topic::Diagnostics,
        }
    }
}

/// The publish contract the pipeline depends on: fire-and-forget delivery of
/// one stamped event, no acknowledgment expected.
pub trait PublishSink: Send + Sync {
    /// Publish `event`, returning the number of receivers it reached.
    fn publish(&self, event: Event) -> Result<usize, BridgeError>;
}

/// Shared event bus. Clone it cheaply – all clones share the same underlying
/// broadcast channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    imu: broadcast::Sender<Event>,
    gps: broadcast::Sender<Event>,
    battery: broadcast::Sender<Event>,
    motion: broadcast::Sender<Event>,
    orientation: broadcast::Sender<Event>,
    camera: broadcast::Sender<Event>,
    diagnostics: broadcast::Sender<Event>,
    /// Mirror of every event, regardless of topic.
    firehose: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new bus; `capacity` applies to every channel independently.
    pub fn new(capacity: usize) -> Self {
        let (imu, _) = broadcast::channel(capacity);
        let (gps, _) = broadcast::channel(capacity);
        let (battery, _) = broadcast::channel(capacity);
        let (motion, _) = broadcast::channel(capacity);
        let (orientation, _) = broadcast::channel(capacity);
        let (camera, _) = broadcast::channel(capacity);
        let (diagnostics, _) = broadcast::channel(capacity);
        let (firehose, _) = broadcast::channel(capacity);
        Self {
            imu,
            gps,
            battery,
            motion,
            orientation,
            camera,
            diagnostics,
            firehose,
        }
    }

    /// Subscribe to a single [`Topic`] lane.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Subscribe to the firehose: every event on every topic.
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.firehose.subscribe()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Imu => &self.imu,
            Topic::Gps => &self.gps,
            Topic::Battery => &self.battery,
            Topic::Motion => &self.motion,
            Topic::Orientation => &self.orientation,
            Topic::Camera => &self.camera,
            Topic::Diagnostics => &self.diagnostics,
        }
    }
}

impl PublishSink for EventBus {
    /// Route `event` to its topic lane and mirror it onto the firehose.
    ///
    /// Returns the number of topic-lane receivers, or
    /// [`BridgeError::Channel`] when nobody subscribes to the lane – a normal
    /// condition the caller may ignore (fire-and-forget).
    fn publish(&self, event: Event) -> Result<usize, BridgeError> {
        let topic = Topic::for_message(&event.payload);
        // The firehose having no listeners is never an error.
        let _ = self.firehose.send(event.clone());
        self.topic_sender(topic)
            .send(event)
            .map_err(|_| BridgeError::Channel(format!("no subscribers for topic {topic:?}")))
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// An async receiver bound to a single [`Topic`] lane.
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event on this topic.
    ///
    /// `Err(Lagged(n))` means the subscriber fell behind and `n` events were
    /// dropped; the caller decides whether to continue. `Err(Closed)` means
    /// the bus has shut down.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
