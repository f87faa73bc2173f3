//! # Stream Subscriptions
//!
//! Channel-backed subscriptions for consumers that want to process events off
//! the publisher's thread.

use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::error::BusError;
use crate::event::Event;
use crate::filter::TopicFilter;
use crate::listener::{EventListener, SharedListener};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The subscription was removed from the bus.
    #[error("Subscription closed")]
    Closed,
}

/// Listener that copies matching events into a channel.
struct ChannelForwarder {
    sender: mpsc::UnboundedSender<Event>,
}

impl EventListener for ChannelForwarder {
    fn on_event(&self, event: &Event) {
        if self.sender.send(event.clone()).is_err() {
            debug!(topic = event.topic(), "Subscription receiver gone, event dropped");
        }
    }
}

/// A subscription handle for receiving events.
///
/// The bus registration owns the channel sender, so the channel closes once
/// the registration is removed, whether by dropping this handle or by an
/// outside `unsubscribe`.
pub struct Subscription {
    bus: Arc<EventBus>,
    tenant_id: String,
    subscriber_id: String,
    filter: TopicFilter,
    listener: Weak<dyn EventListener>,
    receiver: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    /// Receive the next matching event.
    ///
    /// Returns `None` once the subscription has been removed from the bus.
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Receive without waiting.
    ///
    /// - `Ok(Some(event))`: an event was queued
    /// - `Ok(None)`: nothing queued
    /// - `Err(SubscriptionError::Closed)`: the subscription was removed
    pub fn try_recv(&mut self) -> Result<Option<Event>, SubscriptionError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(SubscriptionError::Closed),
        }
    }

    #[must_use]
    pub fn topic_filter(&self) -> &TopicFilter {
        &self.filter
    }

    #[must_use]
    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Convert into a `Stream` of events.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream { subscription: self }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(listener) = self.listener.upgrade() else {
            return;
        };
        match self
            .bus
            .unsubscribe(&self.tenant_id, &self.subscriber_id, &self.filter, &listener)
        {
            Ok(_) => debug!(
                tenant = %self.tenant_id,
                subscriber = %self.subscriber_id,
                "Subscription dropped"
            ),
            Err(e) => warn!(subscriber = %self.subscriber_id, error = %e, "Failed to drop subscription"),
        }
    }
}

/// A stream wrapper for subscriptions.
///
/// Implements `tokio_stream::Stream` for use with stream combinators.
pub struct EventStream {
    subscription: Subscription,
}

impl EventStream {
    #[must_use]
    pub fn topic_filter(&self) -> &TopicFilter {
        self.subscription.topic_filter()
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.subscription.receiver.poll_recv(cx)
    }
}

impl EventBus {
    /// Subscribe a channel to `filter` and return its handle.
    ///
    /// Events are queued without bound; dropping the handle unsubscribes.
    pub fn event_stream(
        self: &Arc<Self>,
        tenant_id: &str,
        subscriber_id: &str,
        filter: TopicFilter,
    ) -> Result<Subscription, BusError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let listener: SharedListener = Arc::new(ChannelForwarder { sender });
        self.subscribe(tenant_id, subscriber_id, &filter, &listener)?;
        Ok(Subscription {
            bus: Arc::clone(self),
            tenant_id: tenant_id.to_string(),
            subscriber_id: subscriber_id.to_string(),
            filter,
            listener: Arc::downgrade(&listener),
            receiver,
        })
    }
}
