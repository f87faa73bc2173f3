//! # Adapter Binding
//!
//! Keeps an adapter's action-trigger subscriptions in step with the
//! description it currently exposes.
//!
//! ```text
//!            notify_bound            notify_binding_update
//! Unbound ───────────────> Bound ───────────────────────> Updated ─┐
//!    ^                       │                              ^      │
//!    │    stop / failure     │                              └──────┘
//!    └───────────────────────┴──────────────────────────────────────
//! ```
//!
//! A (re)binding with actions replaces the previous action filter: the old
//! patterns are unsubscribed before the new ones are subscribed. A binding
//! without actions leaves the current subscriptions as they are.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};
use twin_bus::notify::{publish_pad_available, publish_pad_updated};
use twin_bus::{topics, BusError, Event, EventBus, EventListener, SharedListener, TopicFilter};
use twin_types::PhysicalAssetDescription;

use crate::error::AdapterError;
use crate::ports::{PhysicalAdapter, PhysicalAdapterListener};

/// Binding state of an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingState {
    Unbound,
    Bound,
    Updated,
}

impl fmt::Display for BindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unbound => "unbound",
            Self::Bound => "bound",
            Self::Updated => "updated",
        };
        f.write_str(name)
    }
}

struct BindingSlot {
    state: BindingState,
    pad: Option<PhysicalAssetDescription>,
    filter: TopicFilter,
}

/// Routes action-trigger events to the adapter.
struct ActionRouter {
    core: Weak<BindingCore>,
}

impl EventListener for ActionRouter {
    fn on_event(&self, event: &Event) {
        let Some(core) = self.core.upgrade() else {
            return;
        };
        let binding = PhysicalAdapterBinding { core };
        debug!(adapter_id = binding.adapter_id(), topic = event.topic(), "Incoming physical action");
        binding.core.adapter.on_incoming_physical_action(&binding, event);
    }
}

struct BindingCore {
    bus: Arc<EventBus>,
    tenant_id: String,
    adapter_id: String,
    adapter: Arc<dyn PhysicalAdapter>,
    listener: RwLock<Option<Arc<dyn PhysicalAdapterListener>>>,
    slot: Mutex<BindingSlot>,
    router: SharedListener,
}

impl BindingCore {
    fn listener(&self) -> Option<Arc<dyn PhysicalAdapterListener>> {
        self.listener.read().clone()
    }

    /// Unsubscribe the current action filter and mark the binding unbound.
    fn release(&self, slot: &mut BindingSlot) -> Result<(), BusError> {
        slot.state = BindingState::Unbound;
        let previous = std::mem::take(&mut slot.filter);
        if previous.is_empty() {
            return Ok(());
        }
        self.bus
            .unsubscribe(&self.tenant_id, &self.adapter_id, &previous, &self.router)
            .map(|_| ())
    }
}

impl Drop for BindingCore {
    fn drop(&mut self) {
        let slot = self.slot.get_mut();
        if slot.filter.is_empty() {
            return;
        }
        if let Err(e) = self
            .bus
            .unsubscribe(&self.tenant_id, &self.adapter_id, &slot.filter, &self.router)
        {
            warn!(adapter_id = %self.adapter_id, error = %e, "Failed to release action filter");
        }
    }
}

/// Binding of one physical adapter to a digital twin.
///
/// Cheap to clone; clones share the same binding.
#[derive(Clone)]
pub struct PhysicalAdapterBinding {
    core: Arc<BindingCore>,
}

impl PhysicalAdapterBinding {
    pub fn new(
        bus: Arc<EventBus>,
        tenant_id: impl Into<String>,
        adapter_id: impl Into<String>,
        adapter: Arc<dyn PhysicalAdapter>,
    ) -> Result<Self, AdapterError> {
        let tenant_id = tenant_id.into();
        let adapter_id = adapter_id.into();
        if tenant_id.is_empty() {
            return Err(AdapterError::EmptyKey("tenant"));
        }
        if adapter_id.is_empty() {
            return Err(AdapterError::EmptyKey("adapter"));
        }

        let core = Arc::new_cyclic(|me: &Weak<BindingCore>| {
            let router: SharedListener = Arc::new(ActionRouter { core: me.clone() });
            BindingCore {
                bus,
                tenant_id,
                adapter_id,
                adapter,
                listener: RwLock::new(None),
                slot: Mutex::new(BindingSlot {
                    state: BindingState::Unbound,
                    pad: None,
                    filter: TopicFilter::new(),
                }),
                router,
            }
        });
        Ok(Self { core })
    }

    pub fn adapter_id(&self) -> &str {
        &self.core.adapter_id
    }

    pub fn tenant_id(&self) -> &str {
        &self.core.tenant_id
    }

    /// Install or remove the listener notified of binding changes.
    pub fn set_listener(&self, listener: Option<Arc<dyn PhysicalAdapterListener>>) {
        *self.core.listener.write() = listener;
    }

    pub fn state(&self) -> BindingState {
        self.core.slot.lock().state
    }

    pub fn is_bound(&self) -> bool {
        self.state() != BindingState::Unbound
    }

    /// Description of the current binding.
    pub fn description(&self) -> Option<PhysicalAssetDescription> {
        self.core.slot.lock().pad.clone()
    }

    /// Action-trigger patterns currently subscribed.
    pub fn action_filter(&self) -> TopicFilter {
        self.core.slot.lock().filter.clone()
    }

    /// Run the adapter's start hook. A failing hook reports the adapter as
    /// unbound.
    pub fn start(&self) -> Result<(), AdapterError> {
        info!(tenant = %self.core.tenant_id, adapter_id = %self.core.adapter_id, "Starting physical adapter");
        if let Err(e) = self.core.adapter.on_adapter_start(self) {
            self.unbind(Some(&e));
            return Err(e);
        }
        Ok(())
    }

    /// Run the adapter's stop hook, release the action filter and report the
    /// adapter as unbound.
    pub fn stop(&self) -> Result<(), AdapterError> {
        info!(tenant = %self.core.tenant_id, adapter_id = %self.core.adapter_id, "Stopping physical adapter");
        let outcome = self.core.adapter.on_adapter_stop(self);
        self.unbind(outcome.as_ref().err());
        outcome
    }

    /// Bind the adapter with its first description.
    pub fn notify_bound(&self, pad: PhysicalAssetDescription) -> Result<(), AdapterError> {
        self.bind(pad, BindingState::Bound)
    }

    /// Replace the description of a bound adapter.
    pub fn notify_binding_update(&self, pad: PhysicalAssetDescription) -> Result<(), AdapterError> {
        self.bind(pad, BindingState::Updated)
    }

    fn bind(&self, pad: PhysicalAssetDescription, target: BindingState) -> Result<(), AdapterError> {
        if let Err(e) = self.apply(&pad, target) {
            warn!(adapter_id = %self.core.adapter_id, error = %e, "Binding failed");
            self.core.slot.lock().pad = Some(pad);
            self.unbind(Some(&e));
            return Err(e);
        }

        if let Some(listener) = self.core.listener() {
            match target {
                BindingState::Updated => listener.on_physical_binding_update(&self.core.adapter_id, &pad),
                _ => listener.on_physical_adapter_bound(&self.core.adapter_id, &pad),
            }
        }
        Ok(())
    }

    fn apply(&self, pad: &PhysicalAssetDescription, target: BindingState) -> Result<(), AdapterError> {
        pad.validate()?;
        let core = &self.core;
        {
            let mut slot = core.slot.lock();
            if target == BindingState::Updated && slot.state == BindingState::Unbound {
                return Err(AdapterError::NotBound(core.adapter_id.clone()));
            }

            let filter: TopicFilter = pad.action_keys().map(topics::physical_action_topic).collect();
            if filter.is_empty() {
                info!(adapter_id = %core.adapter_id, "No actions exposed, action subscriptions left unchanged");
            } else {
                let previous = std::mem::take(&mut slot.filter);
                if !previous.is_empty() {
                    core.bus
                        .unsubscribe(&core.tenant_id, &core.adapter_id, &previous, &core.router)?;
                }
                core.bus
                    .subscribe(&core.tenant_id, &core.adapter_id, &filter, &core.router)?;
                debug!(adapter_id = %core.adapter_id, patterns = ?filter.patterns(), "Action filter subscribed");
                slot.filter = filter;
            }
            slot.state = target;
            slot.pad = Some(pad.clone());
        }

        match target {
            BindingState::Updated => publish_pad_updated(&core.bus, &core.tenant_id, &core.adapter_id, pad.clone())?,
            _ => publish_pad_available(&core.bus, &core.tenant_id, &core.adapter_id, pad.clone())?,
        };
        info!(tenant = %core.tenant_id, adapter_id = %core.adapter_id, state = %target, "Physical adapter bound");
        Ok(())
    }

    fn unbind(&self, error: Option<&AdapterError>) {
        let pad = {
            let mut slot = self.core.slot.lock();
            if let Err(e) = self.core.release(&mut slot) {
                warn!(adapter_id = %self.core.adapter_id, error = %e, "Failed to release action filter");
            }
            slot.pad.clone()
        };

        let message = error.map(ToString::to_string);
        if let Some(listener) = self.core.listener() {
            listener.on_physical_adapter_unbound(&self.core.adapter_id, pad.as_ref(), message.as_deref());
        }
    }

    fn publish_physical(&self, topic: String, body: Value) -> Result<usize, AdapterError> {
        let event = Event::with_body(topic, body).with_metadata(topics::METADATA_ADAPTER_ID, self.core.adapter_id.as_str());
        Ok(self.core.bus.publish(&self.core.tenant_id, &self.core.adapter_id, event)?)
    }

    /// Publish a property variation on `dt.physical.event.property.<key>`.
    pub fn publish_property_variation(&self, key: &str, value: Value) -> Result<usize, AdapterError> {
        if key.is_empty() {
            return Err(AdapterError::EmptyKey("property"));
        }
        self.publish_physical(topics::physical_property_topic(key), value)
    }

    /// Publish an event notification on `dt.physical.event.event.<key>`.
    pub fn publish_event_notification(&self, key: &str, body: Value) -> Result<usize, AdapterError> {
        if key.is_empty() {
            return Err(AdapterError::EmptyKey("event"));
        }
        self.publish_physical(topics::physical_event_topic(key), body)
    }

    pub fn publish_relationship_created(&self, name: &str, instance: Value) -> Result<usize, AdapterError> {
        if name.is_empty() {
            return Err(AdapterError::EmptyKey("relationship"));
        }
        self.publish_physical(topics::relationship_created_topic(name), instance)
    }

    pub fn publish_relationship_deleted(&self, name: &str, instance: Value) -> Result<usize, AdapterError> {
        if name.is_empty() {
            return Err(AdapterError::EmptyKey("relationship"));
        }
        self.publish_physical(topics::relationship_deleted_topic(name), instance)
    }
}

impl fmt::Debug for PhysicalAdapterBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalAdapterBinding")
            .field("tenant_id", &self.core.tenant_id)
            .field("adapter_id", &self.core.adapter_id)
            .field("state", &self.state())
            .finish()
    }
}
