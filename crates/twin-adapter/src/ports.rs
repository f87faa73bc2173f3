//! Ports of the binding protocol: the adapter being bound and the party
//! notified of binding changes.

use twin_bus::Event;
use twin_types::PhysicalAssetDescription;

use crate::binding::PhysicalAdapterBinding;
use crate::error::AdapterError;

/// A physical adapter, driven by an external worker supervisor.
///
/// Every hook receives the binding handle so the adapter can report its
/// description ([`PhysicalAdapterBinding::notify_bound`]) and publish
/// physical events.
pub trait PhysicalAdapter: Send + Sync {
    /// Connect to the physical asset. A bound adapter calls `notify_bound`
    /// once it knows its description.
    fn on_adapter_start(&self, binding: &PhysicalAdapterBinding) -> Result<(), AdapterError>;

    fn on_adapter_stop(&self, binding: &PhysicalAdapterBinding) -> Result<(), AdapterError>;

    /// An action-trigger event for one of the exposed actions.
    fn on_incoming_physical_action(&self, binding: &PhysicalAdapterBinding, event: &Event);
}

/// Receives binding changes of physical adapters.
///
/// Implemented by the twin's life cycle layer.
#[allow(unused_variables)]
pub trait PhysicalAdapterListener: Send + Sync {
    fn on_physical_adapter_bound(&self, adapter_id: &str, pad: &PhysicalAssetDescription) {}

    fn on_physical_binding_update(&self, adapter_id: &str, pad: &PhysicalAssetDescription) {}

    /// `error_message` is `None` for a regular stop.
    fn on_physical_adapter_unbound(
        &self,
        adapter_id: &str,
        pad: Option<&PhysicalAssetDescription>,
        error_message: Option<&str>,
    ) {
    }
}
