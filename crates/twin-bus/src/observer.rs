//! # Event Observer
//!
//! Semantic categories over the raw topic namespace. Each category owns a
//! filter with a fixed pattern set that can be observed and unobserved on its
//! own. An event matching several observed categories is delivered once per
//! category.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::error::BusError;
use crate::event::Event;
use crate::filter::TopicFilter;
use crate::listener::{EventListener, SharedListener};
use crate::topics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Twin state updates and state event notifications.
    State,
    /// Property variations, event notifications and relationship changes.
    PhysicalAsset,
    /// Action triggers addressed to physical adapters.
    PhysicalAssetAction,
    /// Actions invoked through digital adapters.
    DigitalAction,
    /// Capability description available/updated.
    PhysicalAssetDescription,
    LifeCycle,
    QueryRequest,
    QueryResult,
}

impl EventCategory {
    pub const ALL: [EventCategory; 8] = [
        Self::State,
        Self::PhysicalAsset,
        Self::PhysicalAssetAction,
        Self::DigitalAction,
        Self::PhysicalAssetDescription,
        Self::LifeCycle,
        Self::QueryRequest,
        Self::QueryResult,
    ];

    /// Fixed pattern set of the category.
    #[must_use]
    pub fn patterns(&self) -> &'static [&'static str] {
        match self {
            Self::State => &[topics::STATE_UPDATE, topics::ALL_STATE_EVENT_NOTIFICATION],
            Self::PhysicalAsset => &[
                topics::ALL_PHYSICAL_PROPERTY_VARIATION,
                topics::ALL_PHYSICAL_EVENT_NOTIFICATION,
                topics::ALL_PHYSICAL_RELATIONSHIP_CREATED,
                topics::ALL_PHYSICAL_RELATIONSHIP_DELETED,
            ],
            Self::PhysicalAssetAction => &[topics::ALL_PHYSICAL_ACTION_TRIGGER],
            Self::DigitalAction => &[topics::ALL_DIGITAL_ACTION],
            Self::PhysicalAssetDescription => &[
                topics::PHYSICAL_ASSET_DESCRIPTION_AVAILABLE,
                topics::PHYSICAL_ASSET_DESCRIPTION_UPDATED,
            ],
            Self::LifeCycle => &[topics::LIFE_CYCLE],
            Self::QueryRequest => &[topics::STORAGE_QUERY_REQUEST],
            Self::QueryResult => &[topics::ALL_STORAGE_QUERY_RESULT],
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Callbacks of an [`EventObserver`]. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait EventObserverListener: Send + Sync {
    fn on_event_subscribed(&self, pattern: &str) {}
    fn on_event_unsubscribed(&self, pattern: &str) {}
    fn on_state_event(&self, event: &Event) {}
    fn on_physical_asset_event(&self, event: &Event) {}
    fn on_physical_asset_action_event(&self, event: &Event) {}
    fn on_digital_action_event(&self, event: &Event) {}
    fn on_physical_asset_description_event(&self, event: &Event) {}
    fn on_life_cycle_event(&self, event: &Event) {}
    fn on_query_request_event(&self, event: &Event) {}
    fn on_query_result_event(&self, event: &Event) {}
}

type CategoryFilters = [TopicFilter; 8];

/// Bus listener registered by the observer.
struct ObserverDispatcher {
    filters: RwLock<CategoryFilters>,
    listener: Arc<dyn EventObserverListener>,
}

impl EventListener for ObserverDispatcher {
    fn on_event_subscribed(&self, pattern: &str) {
        self.listener.on_event_subscribed(pattern);
    }

    fn on_event_unsubscribed(&self, pattern: &str) {
        self.listener.on_event_unsubscribed(pattern);
    }

    fn on_event(&self, event: &Event) {
        let matched: Vec<EventCategory> = {
            let filters = self.filters.read();
            EventCategory::ALL
                .into_iter()
                .filter(|c| filters[c.index()].matches(event.topic()))
                .collect()
        };

        for category in matched {
            match category {
                EventCategory::State => self.listener.on_state_event(event),
                EventCategory::PhysicalAsset => self.listener.on_physical_asset_event(event),
                EventCategory::PhysicalAssetAction => self.listener.on_physical_asset_action_event(event),
                EventCategory::DigitalAction => self.listener.on_digital_action_event(event),
                EventCategory::PhysicalAssetDescription => {
                    self.listener.on_physical_asset_description_event(event)
                }
                EventCategory::LifeCycle => self.listener.on_life_cycle_event(event),
                EventCategory::QueryRequest => self.listener.on_query_request_event(event),
                EventCategory::QueryResult => self.listener.on_query_result_event(event),
            }
        }
    }
}

/// Observes event categories of one tenant on behalf of a listener.
///
/// Dropping the observer unobserves every category.
pub struct EventObserver {
    bus: Arc<EventBus>,
    tenant_id: String,
    observer_id: String,
    dispatcher: Arc<ObserverDispatcher>,
    handle: SharedListener,
}

impl EventObserver {
    pub fn new(
        bus: Arc<EventBus>,
        tenant_id: impl Into<String>,
        observer_id: impl Into<String>,
        listener: Arc<dyn EventObserverListener>,
    ) -> Result<Self, BusError> {
        let tenant_id = tenant_id.into();
        let observer_id = observer_id.into();
        if tenant_id.is_empty() {
            return Err(BusError::invalid("tenant id must not be empty"));
        }
        if observer_id.is_empty() {
            return Err(BusError::invalid("observer id must not be empty"));
        }

        let dispatcher = Arc::new(ObserverDispatcher {
            filters: RwLock::new(Default::default()),
            listener,
        });
        let handle: SharedListener = dispatcher.clone();
        Ok(Self {
            bus,
            tenant_id,
            observer_id,
            dispatcher,
            handle,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn observer_id(&self) -> &str {
        &self.observer_id
    }

    /// Start observing `category`. Re-observing replaces the previous
    /// registration instead of duplicating it.
    pub fn observe(&self, category: EventCategory) -> Result<(), BusError> {
        let filter = TopicFilter::from_patterns(category.patterns().iter().copied());
        let previous = std::mem::replace(
            &mut self.dispatcher.filters.write()[category.index()],
            filter.clone(),
        );
        if !previous.is_empty() {
            self.bus
                .unsubscribe(&self.tenant_id, &self.observer_id, &previous, &self.handle)?;
        }

        if let Err(e) = self
            .bus
            .subscribe(&self.tenant_id, &self.observer_id, &filter, &self.handle)
        {
            self.dispatcher.filters.write()[category.index()].clear();
            return Err(e);
        }
        debug!(tenant = %self.tenant_id, observer = %self.observer_id, ?category, "Observing");
        Ok(())
    }

    /// Stop observing `category`. A no-op when it is not observed.
    pub fn unobserve(&self, category: EventCategory) -> Result<(), BusError> {
        let previous = std::mem::take(&mut self.dispatcher.filters.write()[category.index()]);
        if previous.is_empty() {
            debug!(observer = %self.observer_id, ?category, "Category not observed");
            return Ok(());
        }
        self.bus
            .unsubscribe(&self.tenant_id, &self.observer_id, &previous, &self.handle)?;
        Ok(())
    }

    pub fn observe_all(&self) -> Result<(), BusError> {
        EventCategory::ALL.into_iter().try_for_each(|c| self.observe(c))
    }

    pub fn unobserve_all(&self) -> Result<(), BusError> {
        EventCategory::ALL.into_iter().try_for_each(|c| self.unobserve(c))
    }

    #[must_use]
    pub fn is_observing(&self, category: EventCategory) -> bool {
        !self.dispatcher.filters.read()[category.index()].is_empty()
    }

    /// Snapshot of the category's current filter.
    #[must_use]
    pub fn filter(&self, category: EventCategory) -> TopicFilter {
        self.dispatcher.filters.read()[category.index()].clone()
    }

    pub fn observe_state_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::State)
    }

    pub fn unobserve_state_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::State)
    }

    pub fn observe_physical_asset_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::PhysicalAsset)
    }

    pub fn unobserve_physical_asset_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::PhysicalAsset)
    }

    pub fn observe_physical_asset_action_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::PhysicalAssetAction)
    }

    pub fn unobserve_physical_asset_action_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::PhysicalAssetAction)
    }

    pub fn observe_digital_action_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::DigitalAction)
    }

    pub fn unobserve_digital_action_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::DigitalAction)
    }

    pub fn observe_physical_asset_description_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::PhysicalAssetDescription)
    }

    pub fn unobserve_physical_asset_description_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::PhysicalAssetDescription)
    }

    pub fn observe_life_cycle_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::LifeCycle)
    }

    pub fn unobserve_life_cycle_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::LifeCycle)
    }

    pub fn observe_query_request_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::QueryRequest)
    }

    pub fn unobserve_query_request_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::QueryRequest)
    }

    pub fn observe_query_result_events(&self) -> Result<(), BusError> {
        self.observe(EventCategory::QueryResult)
    }

    pub fn unobserve_query_result_events(&self) -> Result<(), BusError> {
        self.unobserve(EventCategory::QueryResult)
    }
}

impl Drop for EventObserver {
    fn drop(&mut self) {
        if let Err(e) = self.unobserve_all() {
            warn!(observer = %self.observer_id, error = %e, "Failed to release observer");
        }
    }
}
