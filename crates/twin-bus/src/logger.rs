//! Diagnostic hook notified of bus traffic. Purely observational.

use tracing::{debug, error};

use crate::error::BusError;
use crate::event::Event;

pub trait EventBusLogger: Send + Sync {
    fn on_event_published(&self, tenant_id: &str, publisher_id: &str, event: &Event);

    fn on_event_forwarded(&self, tenant_id: &str, publisher_id: &str, subscriber_id: &str, event: &Event);

    fn on_client_subscription(&self, tenant_id: &str, subscriber_id: &str, pattern: &str);

    fn on_client_unsubscription(&self, tenant_id: &str, subscriber_id: &str, pattern: &str);

    /// A listener panicked; `failure` is always [`BusError::DispatchFailure`].
    fn on_dispatch_failure(&self, _tenant_id: &str, _failure: &BusError) {}
}

/// Logger that writes bus traffic to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventLogger;

impl EventBusLogger for TracingEventLogger {
    fn on_event_published(&self, tenant_id: &str, publisher_id: &str, event: &Event) {
        debug!(tenant = tenant_id, publisher = publisher_id, topic = event.topic(), "Event published");
    }

    fn on_event_forwarded(&self, tenant_id: &str, publisher_id: &str, subscriber_id: &str, event: &Event) {
        debug!(
            tenant = tenant_id,
            publisher = publisher_id,
            subscriber = subscriber_id,
            topic = event.topic(),
            "Event forwarded"
        );
    }

    fn on_client_subscription(&self, tenant_id: &str, subscriber_id: &str, pattern: &str) {
        debug!(tenant = tenant_id, subscriber = subscriber_id, pattern, "Subscribed");
    }

    fn on_client_unsubscription(&self, tenant_id: &str, subscriber_id: &str, pattern: &str) {
        debug!(tenant = tenant_id, subscriber = subscriber_id, pattern, "Unsubscribed");
    }

    fn on_dispatch_failure(&self, tenant_id: &str, failure: &BusError) {
        error!(tenant = tenant_id, error = %failure, "Listener failed during dispatch");
    }
}
