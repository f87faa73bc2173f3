//! # Event Bus
//!
//! Tenant-scoped registry of `(pattern -> subscribers)` with in-line delivery.
//!
//! ## Locking
//!
//! The tenant map is a `DashMap`; each tenant's pattern table sits behind its
//! own `RwLock`. `publish` snapshots the matching subscribers under the read
//! lock and releases it before running any callback, so listeners may
//! subscribe or unsubscribe from inside `on_event`. Hooks
//! (`on_event_subscribed`, logger callbacks) also run after the lock is
//! released.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, error, trace};

use crate::error::BusError;
use crate::event::Event;
use crate::filter::{is_wildcard_pattern, topic_matches, TopicFilter};
use crate::listener::{SharedListener, SubscriberInfo};
use crate::logger::EventBusLogger;

/// Pattern table of one tenant.
#[derive(Default)]
struct TenantSubscriptions {
    by_pattern: HashMap<String, Vec<SubscriberInfo>>,
    /// Wildcard patterns in first-registration order.
    wildcards: Vec<String>,
}

impl TenantSubscriptions {
    /// Exact subscribers first, then wildcard subscribers by pattern order.
    fn matching(&self, topic: &str) -> Vec<SubscriberInfo> {
        let mut matched = Vec::new();
        if let Some(exact) = self.by_pattern.get(topic) {
            matched.extend(exact.iter().cloned());
        }
        for pattern in self.wildcards.iter().filter(|p| p.as_str() != topic) {
            if topic_matches(pattern, topic) {
                if let Some(subscribers) = self.by_pattern.get(pattern) {
                    matched.extend(subscribers.iter().cloned());
                }
            }
        }
        matched
    }

    /// Returns `false` if the pair was already registered.
    fn insert(&mut self, pattern: &str, subscriber_id: &str, listener: &SharedListener) -> bool {
        let subscribers = match self.by_pattern.get_mut(pattern) {
            Some(subscribers) => subscribers,
            None => {
                if is_wildcard_pattern(pattern) {
                    self.wildcards.push(pattern.to_string());
                }
                self.by_pattern.entry(pattern.to_string()).or_default()
            }
        };
        if subscribers.iter().any(|s| s.is(subscriber_id, listener)) {
            return false;
        }
        subscribers.push(SubscriberInfo::new(subscriber_id, listener));
        true
    }

    /// Returns `false` if the pair was not registered.
    fn remove(&mut self, pattern: &str, subscriber_id: &str, listener: &SharedListener) -> bool {
        let Some(subscribers) = self.by_pattern.get_mut(pattern) else {
            return false;
        };
        let Some(position) = subscribers.iter().position(|s| s.is(subscriber_id, listener)) else {
            return false;
        };
        subscribers.remove(position);
        if subscribers.is_empty() {
            self.by_pattern.remove(pattern);
            self.wildcards.retain(|p| p != pattern);
        }
        true
    }
}

/// Process-local, multi-tenant publish/subscribe bus.
///
/// Build one per runtime and share it as `Arc<EventBus>`.
pub struct EventBus {
    tenants: DashMap<String, Arc<RwLock<TenantSubscriptions>>>,
    logger: RwLock<Option<Arc<dyn EventBusLogger>>>,
    events_published: AtomicU64,
    events_forwarded: AtomicU64,
    dispatch_failures: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenants: DashMap::new(),
            logger: RwLock::new(None),
            events_published: AtomicU64::new(0),
            events_forwarded: AtomicU64::new(0),
            dispatch_failures: AtomicU64::new(0),
        }
    }

    /// Create a bus with a diagnostic logger installed.
    #[must_use]
    pub fn with_logger(logger: Arc<dyn EventBusLogger>) -> Self {
        let bus = Self::new();
        bus.set_event_logger(Some(logger));
        bus
    }

    /// Install, replace or (with `None`) remove the diagnostic logger.
    pub fn set_event_logger(&self, logger: Option<Arc<dyn EventBusLogger>>) {
        *self.logger.write() = logger;
    }

    fn logger(&self) -> Option<Arc<dyn EventBusLogger>> {
        self.logger.read().clone()
    }

    fn tenant(&self, tenant_id: &str) -> Option<Arc<RwLock<TenantSubscriptions>>> {
        self.tenants.get(tenant_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Deliver `event` to every subscriber of `tenant_id` whose pattern matches
    /// its topic.
    ///
    /// Callbacks run in-line, in registration order. A panicking listener is
    /// logged and skipped. Returns the number of successful forwards; zero
    /// matching subscribers is not an error.
    pub fn publish(&self, tenant_id: &str, publisher_id: &str, event: Event) -> Result<usize, BusError> {
        if tenant_id.is_empty() {
            return Err(BusError::invalid("tenant id must not be empty"));
        }
        if event.topic().is_empty() {
            return Err(BusError::invalid("event topic must not be empty"));
        }

        self.events_published.fetch_add(1, Ordering::Relaxed);
        let logger = self.logger();
        notify_logger(&logger, tenant_id, |l| l.on_event_published(tenant_id, publisher_id, &event));

        let targets = match self.tenant(tenant_id) {
            Some(tenant) => tenant.read().matching(event.topic()),
            None => Vec::new(),
        };
        if targets.is_empty() {
            trace!(tenant = tenant_id, topic = event.topic(), "No subscribers for topic");
            return Ok(0);
        }

        let mut forwarded = 0;
        for target in targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| target.listener.on_event(&event)));
            match outcome {
                Ok(()) => {
                    forwarded += 1;
                    notify_logger(&logger, tenant_id, |l| {
                        l.on_event_forwarded(tenant_id, publisher_id, &target.subscriber_id, &event);
                    });
                }
                Err(payload) => {
                    self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
                    let failure = BusError::DispatchFailure {
                        subscriber_id: target.subscriber_id.clone(),
                        topic: event.topic().to_string(),
                        reason: panic_message(payload.as_ref()),
                    };
                    error!(tenant = tenant_id, error = %failure, "Listener panicked");
                    notify_logger(&logger, tenant_id, |l| l.on_dispatch_failure(tenant_id, &failure));
                }
            }
        }

        self.events_forwarded.fetch_add(forwarded as u64, Ordering::Relaxed);
        Ok(forwarded)
    }

    /// Register `(subscriber_id, listener)` on every pattern of `filter`.
    ///
    /// Already registered pairs are skipped. Returns how many new
    /// registrations were made; `on_event_subscribed` fires once for each.
    pub fn subscribe(
        &self,
        tenant_id: &str,
        subscriber_id: &str,
        filter: &TopicFilter,
        listener: &SharedListener,
    ) -> Result<usize, BusError> {
        if tenant_id.is_empty() {
            return Err(BusError::invalid("tenant id must not be empty"));
        }
        if subscriber_id.is_empty() {
            return Err(BusError::invalid("subscriber id must not be empty"));
        }
        if filter.is_empty() {
            return Err(BusError::invalid("topic filter must not be empty"));
        }

        let mut added = Vec::with_capacity(filter.len());
        {
            // The map entry stays locked so an emptied tenant cannot be
            // dropped between lookup and insert.
            let tenant = self.tenants.entry(tenant_id.to_string()).or_default();
            let mut table = tenant.write();
            for pattern in filter.iter() {
                if table.insert(pattern, subscriber_id, listener) {
                    added.push(pattern);
                } else {
                    debug!(
                        tenant = tenant_id,
                        subscriber = subscriber_id,
                        pattern,
                        "Already subscribed, skipping"
                    );
                }
            }
        }

        let logger = self.logger();
        for pattern in &added {
            notify_logger(&logger, tenant_id, |l| l.on_client_subscription(tenant_id, subscriber_id, pattern));
            listener.on_event_subscribed(pattern);
        }
        Ok(added.len())
    }

    /// Remove `(subscriber_id, listener)` from every pattern of `filter`.
    ///
    /// Unknown patterns and pairs are ignored. Returns how many registrations
    /// were removed; `on_event_unsubscribed` fires once for each.
    pub fn unsubscribe(
        &self,
        tenant_id: &str,
        subscriber_id: &str,
        filter: &TopicFilter,
        listener: &SharedListener,
    ) -> Result<usize, BusError> {
        if tenant_id.is_empty() {
            return Err(BusError::invalid("tenant id must not be empty"));
        }
        let Some(tenant) = self.tenant(tenant_id) else {
            return Ok(0);
        };

        let mut removed = Vec::with_capacity(filter.len());
        {
            let mut table = tenant.write();
            for pattern in filter.iter() {
                if table.remove(pattern, subscriber_id, listener) {
                    removed.push(pattern);
                }
            }
        }
        if !removed.is_empty() {
            self.tenants
                .remove_if(tenant_id, |_, table| table.read().by_pattern.is_empty());
        }

        let logger = self.logger();
        for pattern in &removed {
            notify_logger(&logger, tenant_id, |l| l.on_client_unsubscription(tenant_id, subscriber_id, pattern));
            listener.on_event_unsubscribed(pattern);
        }
        Ok(removed.len())
    }

    /// Number of registrations under `(tenant_id, pattern)`.
    #[must_use]
    pub fn subscriber_count(&self, tenant_id: &str, pattern: &str) -> usize {
        self.tenant(tenant_id)
            .map(|tenant| tenant.read().by_pattern.get(pattern).map_or(0, Vec::len))
            .unwrap_or(0)
    }

    /// Whether any pattern of `tenant_id` has a registration.
    #[must_use]
    pub fn has_subscribers(&self, tenant_id: &str) -> bool {
        self.tenant(tenant_id)
            .is_some_and(|tenant| !tenant.read().by_pattern.is_empty())
    }

    #[must_use]
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn events_forwarded(&self) -> u64 {
        self.events_forwarded.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dispatch_failures(&self) -> u64 {
        self.dispatch_failures.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Run one logger callback. A panicking logger is reported and ignored.
fn notify_logger(
    logger: &Option<Arc<dyn EventBusLogger>>,
    tenant_id: &str,
    notify: impl FnOnce(&dyn EventBusLogger),
) {
    let Some(logger) = logger else {
        return;
    };
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| notify(logger.as_ref()))) {
        error!(tenant = tenant_id, reason = %panic_message(payload.as_ref()), "Bus logger panicked");
    }
}

/// Text of a panic payload caught with `catch_unwind`.
#[must_use]
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}
