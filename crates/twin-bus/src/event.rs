//! # Event Envelope
//!
//! The unit of data carried by the bus: a topic, an opaque body, ordered
//! metadata and its creation time.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use twin_types::current_time_ms;

/// Shared, type-erased event payload.
pub type EventBody = Arc<dyn Any + Send + Sync>;

/// An event published on the bus.
///
/// Clones share the body. Once handed to [`crate::EventBus::publish`] an
/// event is only ever read.
#[derive(Clone)]
pub struct Event {
    topic: String,
    body: Option<EventBody>,
    metadata: BTreeMap<String, serde_json::Value>,
    created_at: Instant,
    timestamp_ms: u64,
}

impl Event {
    /// Create an event with no body.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            body: None,
            metadata: BTreeMap::new(),
            created_at: Instant::now(),
            timestamp_ms: current_time_ms(),
        }
    }

    /// Create an event carrying `body`.
    pub fn with_body<T: Any + Send + Sync>(topic: impl Into<String>, body: T) -> Self {
        Self::new(topic).body(body)
    }

    /// Replace the body.
    #[must_use]
    pub fn body<T: Any + Send + Sync>(mut self, body: T) -> Self {
        self.body = Some(Arc::new(body));
        self
    }

    /// Attach one metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Raw body handle, if any.
    pub fn raw_body(&self) -> Option<&EventBody> {
        self.body.as_ref()
    }

    /// Body downcast to `T`. `None` when absent or of another type.
    pub fn body_as<T: Any>(&self) -> Option<&T> {
        self.body.as_deref().and_then(|b| b.downcast_ref::<T>())
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&serde_json::Value> {
        self.metadata.get(key)
    }

    /// Monotonic creation instant.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Wall-clock creation time in milliseconds since the Unix epoch.
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("topic", &self.topic)
            .field("has_body", &self.body.is_some())
            .field("metadata", &self.metadata)
            .field("timestamp_ms", &self.timestamp_ms)
            .finish()
    }
}
