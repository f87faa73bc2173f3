//! # Storage Manager
//!
//! Storage service of one digital twin. It observes the twin's event
//! categories, records every observed event into each registered storage and
//! answers query requests published on `dt.storage.query.request`.
//!
//! ```text
//! dt.state.update ──────┐                 ┌──> storage A
//! dt.physical.event.* ──┼─> StorageManager┼──> storage B
//! dt.lifecycle ─────────┘        │        └──> ...
//!                                │
//! dt.storage.query.request ──────┴─> QueryManager ─> dt.storage.query.result.<id>
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use twin_bus::notify::publish_query_result;
use twin_bus::{panic_message, topic_matches, topics, BusError, Event, EventBus, EventCategory, EventObserver, EventObserverListener};
use twin_types::{
    LifeCycleState, PhysicalAssetDescription, QueryRequest, QueryResourceType, QueryResult, StorageError,
};

use crate::domain::{DefaultQueryManager, QueryManager};
use crate::error::QueryError;
use crate::ports::TwinStorage;

/// Bus client id of the storage manager.
pub const STORAGE_MANAGER_ID: &str = "storage_manager";

/// Categories observed while the manager runs.
const OBSERVED: [EventCategory; 7] = [
    EventCategory::State,
    EventCategory::PhysicalAsset,
    EventCategory::PhysicalAssetAction,
    EventCategory::PhysicalAssetDescription,
    EventCategory::DigitalAction,
    EventCategory::LifeCycle,
    EventCategory::QueryRequest,
];

/// Resource a topic is stored under. `None` for topics that are not recorded.
#[must_use]
pub fn resource_for_topic(topic: &str) -> Option<QueryResourceType> {
    let resource = match topic {
        topics::STATE_UPDATE => QueryResourceType::DigitalTwinState,
        t if topic_matches(topics::ALL_STATE_EVENT_NOTIFICATION, t) => {
            QueryResourceType::DigitalTwinStateEventNotification
        }
        topics::LIFE_CYCLE => QueryResourceType::LifeCycleEvent,
        topics::PHYSICAL_ASSET_DESCRIPTION_AVAILABLE => QueryResourceType::NewPadNotification,
        topics::PHYSICAL_ASSET_DESCRIPTION_UPDATED => QueryResourceType::UpdatedPadNotification,
        t if topic_matches(topics::ALL_PHYSICAL_PROPERTY_VARIATION, t) => {
            QueryResourceType::PhysicalAssetPropertyVariation
        }
        t if topic_matches(topics::ALL_PHYSICAL_EVENT_NOTIFICATION, t) => {
            QueryResourceType::PhysicalAssetEventNotification
        }
        t if topic_matches(topics::ALL_PHYSICAL_RELATIONSHIP_CREATED, t) => {
            QueryResourceType::PhysicalRelationshipInstanceCreatedNotification
        }
        t if topic_matches(topics::ALL_PHYSICAL_RELATIONSHIP_DELETED, t) => {
            QueryResourceType::PhysicalRelationshipInstanceDeletedNotification
        }
        t if topic_matches(topics::ALL_PHYSICAL_ACTION_TRIGGER, t) => QueryResourceType::PhysicalActionRequest,
        t if topic_matches(topics::ALL_DIGITAL_ACTION, t) => QueryResourceType::DigitalActionRequest,
        _ => return None,
    };
    Some(resource)
}

/// JSON form of an event body, for the body types exchanged on the bus.
fn body_json(event: &Event) -> Value {
    if event.raw_body().is_none() {
        return Value::Null;
    }
    if let Some(v) = event.body_as::<Value>() {
        return v.clone();
    }
    if let Some(pad) = event.body_as::<PhysicalAssetDescription>() {
        return serde_json::to_value(pad).unwrap_or(Value::Null);
    }
    if let Some(state) = event.body_as::<LifeCycleState>() {
        return json!(state.as_str());
    }
    if let Some(s) = event.body_as::<String>() {
        return json!(s);
    }
    if let Some(s) = event.body_as::<&'static str>() {
        return json!(s);
    }
    if let Some(b) = event.body_as::<bool>() {
        return json!(b);
    }
    if let Some(n) = event.body_as::<i64>() {
        return json!(n);
    }
    if let Some(n) = event.body_as::<u64>() {
        return json!(n);
    }
    if let Some(n) = event.body_as::<i32>() {
        return json!(n);
    }
    if let Some(n) = event.body_as::<f64>() {
        return json!(n);
    }
    debug!(topic = event.topic(), "Event body has no JSON form, storing null");
    Value::Null
}

/// Stored form of an event.
#[must_use]
pub fn event_record(event: &Event) -> Value {
    json!({
        "topic": event.topic(),
        "timestamp_ms": event.timestamp_ms(),
        "metadata": event.metadata(),
        "body": body_json(event),
    })
}

/// State shared with the observer callbacks.
struct StorageManagerInner {
    bus: Arc<EventBus>,
    tenant_id: String,
    storages: RwLock<Vec<Arc<dyn TwinStorage>>>,
    query_manager: RwLock<Arc<dyn QueryManager>>,
}

impl StorageManagerInner {
    fn snapshot(&self) -> Vec<Arc<dyn TwinStorage>> {
        self.storages.read().clone()
    }

    fn record(&self, event: &Event) {
        let Some(resource) = resource_for_topic(event.topic()) else {
            debug!(topic = event.topic(), "Topic not stored");
            return;
        };
        let record = event_record(event);
        for storage in self.snapshot() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                storage.record(resource, event.timestamp_ms(), record.clone())
            }))
            .unwrap_or_else(|payload| Err(StorageError::Backend(panic_message(payload.as_ref()))));
            if let Err(e) = outcome {
                warn!(
                    tenant = %self.tenant_id,
                    storage = storage.storage_id(),
                    %resource,
                    error = %e,
                    "Failed to record event"
                );
            }
        }
    }

    fn answer(&self, event: &Event) {
        let Some(request) = event.body_as::<QueryRequest>() else {
            warn!(tenant = %self.tenant_id, topic = event.topic(), "Event body is not a query request");
            return;
        };
        debug!(tenant = %self.tenant_id, request_id = %request.request_id, "Query request received");

        let storages = self.snapshot();
        let manager = Arc::clone(&*self.query_manager.read());
        let result = catch_unwind(AssertUnwindSafe(|| manager.handle_query(&self.tenant_id, request, &storages)))
            .unwrap_or_else(|payload| {
                let error = QueryError::Panicked(panic_message(payload.as_ref()));
                warn!(tenant = %self.tenant_id, request_id = %request.request_id, "{error}");
                QueryResult::failure(request.clone(), error.to_string())
            });
        if let Err(e) = publish_query_result(&self.bus, &self.tenant_id, STORAGE_MANAGER_ID, result) {
            warn!(request_id = %request.request_id, error = %e, "Failed to publish query result");
        }
    }
}

impl EventObserverListener for StorageManagerInner {
    fn on_event_subscribed(&self, pattern: &str) {
        debug!(tenant = %self.tenant_id, pattern, "Storage manager subscribed");
    }

    fn on_event_unsubscribed(&self, pattern: &str) {
        debug!(tenant = %self.tenant_id, pattern, "Storage manager unsubscribed");
    }

    fn on_state_event(&self, event: &Event) {
        self.record(event);
    }

    fn on_physical_asset_event(&self, event: &Event) {
        self.record(event);
    }

    fn on_physical_asset_action_event(&self, event: &Event) {
        self.record(event);
    }

    fn on_digital_action_event(&self, event: &Event) {
        self.record(event);
    }

    fn on_physical_asset_description_event(&self, event: &Event) {
        self.record(event);
    }

    fn on_life_cycle_event(&self, event: &Event) {
        self.record(event);
    }

    fn on_query_request_event(&self, event: &Event) {
        self.answer(event);
    }
}

/// Storage service of one digital twin.
pub struct StorageManager {
    inner: Arc<StorageManagerInner>,
    observer: Mutex<Option<EventObserver>>,
}

impl StorageManager {
    pub fn new(bus: Arc<EventBus>, tenant_id: impl Into<String>) -> Self {
        Self::with_query_manager(bus, tenant_id, Arc::new(DefaultQueryManager))
    }

    pub fn with_query_manager(
        bus: Arc<EventBus>,
        tenant_id: impl Into<String>,
        query_manager: Arc<dyn QueryManager>,
    ) -> Self {
        Self {
            inner: Arc::new(StorageManagerInner {
                bus,
                tenant_id: tenant_id.into(),
                storages: RwLock::new(Vec::new()),
                query_manager: RwLock::new(query_manager),
            }),
            observer: Mutex::new(None),
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.inner.tenant_id
    }

    pub fn set_query_manager(&self, query_manager: Arc<dyn QueryManager>) {
        *self.inner.query_manager.write() = query_manager;
    }

    /// Register a storage. Storages answer queries in registration order.
    pub fn put_storage(&self, storage: Arc<dyn TwinStorage>) -> Result<(), StorageError> {
        let mut storages = self.inner.storages.write();
        if storages.iter().any(|s| s.storage_id() == storage.storage_id()) {
            return Err(StorageError::AlreadyRegistered(storage.storage_id().to_string()));
        }
        info!(tenant = %self.inner.tenant_id, storage = storage.storage_id(), "Storage registered");
        storages.push(storage);
        Ok(())
    }

    pub fn get_storage(&self, storage_id: &str) -> Option<Arc<dyn TwinStorage>> {
        self.inner
            .storages
            .read()
            .iter()
            .find(|s| s.storage_id() == storage_id)
            .cloned()
    }

    pub fn remove_storage(&self, storage_id: &str) -> Result<Arc<dyn TwinStorage>, StorageError> {
        let mut storages = self.inner.storages.write();
        let position = storages
            .iter()
            .position(|s| s.storage_id() == storage_id)
            .ok_or_else(|| StorageError::NotFound(storage_id.to_string()))?;
        Ok(storages.remove(position))
    }

    /// Registered storage ids, in registration order.
    pub fn storage_ids(&self) -> Vec<String> {
        self.inner
            .storages
            .read()
            .iter()
            .map(|s| s.storage_id().to_string())
            .collect()
    }

    /// Observe the twin's events and start answering queries.
    ///
    /// Calling `start` on a running manager does nothing.
    pub fn start(&self) -> Result<(), BusError> {
        let mut slot = self.observer.lock();
        if slot.is_some() {
            return Ok(());
        }

        let listener: Arc<dyn EventObserverListener> = self.inner.clone();
        let observer = EventObserver::new(
            Arc::clone(&self.inner.bus),
            self.inner.tenant_id.clone(),
            STORAGE_MANAGER_ID,
            listener,
        )?;
        for category in OBSERVED {
            observer.observe(category)?;
        }
        *slot = Some(observer);
        info!(tenant = %self.inner.tenant_id, "Storage manager started");
        Ok(())
    }

    /// Stop observing. Registered storages are kept.
    pub fn stop(&self) -> Result<(), BusError> {
        let Some(observer) = self.observer.lock().take() else {
            debug!(tenant = %self.inner.tenant_id, "Storage manager not running");
            return Ok(());
        };
        observer.unobserve_all()?;
        info!(tenant = %self.inner.tenant_id, "Storage manager stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.observer.lock().is_some()
    }

    /// Answer `request` directly, without going through the bus.
    pub fn handle_query(&self, request: &QueryRequest) -> QueryResult {
        let storages = self.inner.snapshot();
        let manager = Arc::clone(&*self.inner.query_manager.read());
        manager.handle_query(&self.inner.tenant_id, request, &storages)
    }
}
