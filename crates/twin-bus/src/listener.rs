//! Listener side of the bus.

use std::sync::Arc;

use crate::event::Event;

/// Callback target of a bus subscription.
///
/// `on_event` runs on the publisher's thread. Implementations that need to do
/// slow work should hand the event off (see [`crate::EventBus::event_stream`]).
pub trait EventListener: Send + Sync {
    /// A new `(subscriber, listener)` pair was registered on `pattern`.
    fn on_event_subscribed(&self, _pattern: &str) {}

    /// The pair was removed from `pattern`.
    fn on_event_unsubscribed(&self, _pattern: &str) {}

    fn on_event(&self, event: &Event);
}

pub type SharedListener = Arc<dyn EventListener>;

/// One registration under a `(tenant, pattern)` key.
#[derive(Clone)]
pub(crate) struct SubscriberInfo {
    pub(crate) subscriber_id: String,
    pub(crate) listener: SharedListener,
}

impl SubscriberInfo {
    pub(crate) fn new(subscriber_id: &str, listener: &SharedListener) -> Self {
        Self {
            subscriber_id: subscriber_id.to_string(),
            listener: Arc::clone(listener),
        }
    }

    /// Same subscriber id and the same listener object.
    pub(crate) fn is(&self, subscriber_id: &str, listener: &SharedListener) -> bool {
        self.subscriber_id == subscriber_id
            && std::ptr::addr_eq(Arc::as_ptr(&self.listener), Arc::as_ptr(listener))
    }
}
