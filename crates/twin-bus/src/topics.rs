//! # Topic Namespace
//!
//! Fixed, dot-segmented topics used by the digital twin runtime. Patterns
//! ending in [`MULTI_LEVEL_WILDCARD`] match the base topic and every topic
//! below it.

/// Multi-level wildcard segment.
pub const MULTI_LEVEL_WILDCARD: &str = "*";

// =============================================================================
// PHYSICAL INTERFACE
// =============================================================================

pub const PHYSICAL_ACTION_TRIGGER_BASE: &str = "dt.physical.event.action";
pub const PHYSICAL_EVENT_NOTIFICATION_BASE: &str = "dt.physical.event.event";
pub const PHYSICAL_PROPERTY_VARIATION_BASE: &str = "dt.physical.event.property";
pub const PHYSICAL_RELATIONSHIP_CREATED_BASE: &str = "dt.physical.event.relationship.created";
pub const PHYSICAL_RELATIONSHIP_DELETED_BASE: &str = "dt.physical.event.relationship.deleted";

pub const ALL_PHYSICAL_ACTION_TRIGGER: &str = "dt.physical.event.action.*";
pub const ALL_PHYSICAL_EVENT_NOTIFICATION: &str = "dt.physical.event.event.*";
pub const ALL_PHYSICAL_PROPERTY_VARIATION: &str = "dt.physical.event.property.*";
pub const ALL_PHYSICAL_RELATIONSHIP_CREATED: &str = "dt.physical.event.relationship.created.*";
pub const ALL_PHYSICAL_RELATIONSHIP_DELETED: &str = "dt.physical.event.relationship.deleted.*";

pub const PHYSICAL_ASSET_DESCRIPTION_AVAILABLE: &str = "dt.physical.event.pad.available";
pub const PHYSICAL_ASSET_DESCRIPTION_UPDATED: &str = "dt.physical.event.pad.updated";

/// Metadata key identifying the adapter that published a PAD event.
pub const METADATA_ADAPTER_ID: &str = "adapter_id";

// =============================================================================
// DIGITAL INTERFACE
// =============================================================================

pub const DIGITAL_ACTION_BASE: &str = "dt.digital.event.action";
pub const ALL_DIGITAL_ACTION: &str = "dt.digital.event.action.*";

// =============================================================================
// STATE, LIFE CYCLE, STORAGE
// =============================================================================

pub const STATE_UPDATE: &str = "dt.state.update";
pub const STATE_EVENT_NOTIFICATION_BASE: &str = "dt.state.event.notification";
pub const ALL_STATE_EVENT_NOTIFICATION: &str = "dt.state.event.notification.*";

pub const LIFE_CYCLE: &str = "dt.lifecycle";

pub const STORAGE_QUERY_REQUEST: &str = "dt.storage.query.request";
pub const STORAGE_QUERY_RESULT_BASE: &str = "dt.storage.query.result";
pub const ALL_STORAGE_QUERY_RESULT: &str = "dt.storage.query.result.*";

fn child(base: &str, key: &str) -> String {
    format!("{base}.{key}")
}

/// `dt.physical.event.action.<action_key>`
#[must_use]
pub fn physical_action_topic(action_key: &str) -> String {
    child(PHYSICAL_ACTION_TRIGGER_BASE, action_key)
}

/// `dt.physical.event.event.<event_key>`
#[must_use]
pub fn physical_event_topic(event_key: &str) -> String {
    child(PHYSICAL_EVENT_NOTIFICATION_BASE, event_key)
}

/// `dt.physical.event.property.<property_key>`
#[must_use]
pub fn physical_property_topic(property_key: &str) -> String {
    child(PHYSICAL_PROPERTY_VARIATION_BASE, property_key)
}

/// `dt.physical.event.relationship.created.<name>`
#[must_use]
pub fn relationship_created_topic(name: &str) -> String {
    child(PHYSICAL_RELATIONSHIP_CREATED_BASE, name)
}

/// `dt.physical.event.relationship.deleted.<name>`
#[must_use]
pub fn relationship_deleted_topic(name: &str) -> String {
    child(PHYSICAL_RELATIONSHIP_DELETED_BASE, name)
}

/// `dt.digital.event.action.<action_key>`
#[must_use]
pub fn digital_action_topic(action_key: &str) -> String {
    child(DIGITAL_ACTION_BASE, action_key)
}

/// `dt.state.event.notification.<key>`
#[must_use]
pub fn state_event_notification_topic(key: &str) -> String {
    child(STATE_EVENT_NOTIFICATION_BASE, key)
}

/// Reply topic of a storage query: `dt.storage.query.result.<request_id>`.
#[must_use]
pub fn query_result_topic(request_id: &str) -> String {
    child(STORAGE_QUERY_RESULT_BASE, request_id)
}
