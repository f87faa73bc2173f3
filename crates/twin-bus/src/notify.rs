//! Publishing helpers for the well-known twin events.

use twin_types::{LifeCycleState, PhysicalAssetDescription, QueryRequest, QueryResult};

use crate::bus::EventBus;
use crate::error::BusError;
use crate::event::Event;
use crate::topics;

/// Announce the capability description of a freshly bound adapter.
pub fn publish_pad_available(
    bus: &EventBus,
    tenant_id: &str,
    adapter_id: &str,
    pad: PhysicalAssetDescription,
) -> Result<usize, BusError> {
    publish_pad(bus, tenant_id, adapter_id, topics::PHYSICAL_ASSET_DESCRIPTION_AVAILABLE, pad)
}

/// Announce a changed capability description.
pub fn publish_pad_updated(
    bus: &EventBus,
    tenant_id: &str,
    adapter_id: &str,
    pad: PhysicalAssetDescription,
) -> Result<usize, BusError> {
    publish_pad(bus, tenant_id, adapter_id, topics::PHYSICAL_ASSET_DESCRIPTION_UPDATED, pad)
}

fn publish_pad(
    bus: &EventBus,
    tenant_id: &str,
    adapter_id: &str,
    topic: &str,
    pad: PhysicalAssetDescription,
) -> Result<usize, BusError> {
    let event = Event::with_body(topic, pad).with_metadata(topics::METADATA_ADAPTER_ID, adapter_id);
    bus.publish(tenant_id, adapter_id, event)
}

pub fn publish_life_cycle_event(
    bus: &EventBus,
    tenant_id: &str,
    publisher_id: &str,
    state: LifeCycleState,
) -> Result<usize, BusError> {
    bus.publish(tenant_id, publisher_id, Event::with_body(topics::LIFE_CYCLE, state))
}

pub fn publish_query_request(
    bus: &EventBus,
    tenant_id: &str,
    publisher_id: &str,
    request: QueryRequest,
) -> Result<usize, BusError> {
    bus.publish(
        tenant_id,
        publisher_id,
        Event::with_body(topics::STORAGE_QUERY_REQUEST, request),
    )
}

/// Publish `result` on the reply topic of its originating request.
pub fn publish_query_result(
    bus: &EventBus,
    tenant_id: &str,
    publisher_id: &str,
    result: QueryResult,
) -> Result<usize, BusError> {
    let topic = topics::query_result_topic(result.request_id());
    bus.publish(tenant_id, publisher_id, Event::with_body(topic, result))
}
