//! # Storage Query Types
//!
//! Request and result exchanged between a query executor and the storage
//! service over the event bus.
//!
//! The `request_id` is generated once per request and doubles as the routing
//! key of the reply topic (`dt.storage.query.result.<request_id>`), so it is a
//! UUIDv4 string and must never be reused.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::current_time_ms;

/// What kind of selection a query performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryRequestType {
    /// Records whose timestamp falls in `[start_timestamp_ms, end_timestamp_ms]`.
    TimeRange,
    /// Records whose index falls in `[start_index, end_index]`.
    SampleRange,
    /// Most recent record.
    LastValue,
    /// Number of stored records.
    Count,
}

/// Which stored resource a query targets.
///
/// Serialized under its storage name, the same string as [`Self::as_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryResourceType {
    #[serde(rename = "storage_physical_property_variation")]
    PhysicalAssetPropertyVariation,
    #[serde(rename = "storage_physical_event_notification")]
    PhysicalAssetEventNotification,
    #[serde(rename = "storage_physical_action_request")]
    PhysicalActionRequest,
    #[serde(rename = "storage_digital_action_request")]
    DigitalActionRequest,
    #[serde(rename = "storage_dt_state")]
    DigitalTwinState,
    /// Notifications published on `dt.state.event.notification.<key>`.
    #[serde(rename = "storage_dt_state_event_notification")]
    DigitalTwinStateEventNotification,
    #[serde(rename = "storage_new_pad_notification")]
    NewPadNotification,
    #[serde(rename = "storage_updated_pad_notification")]
    UpdatedPadNotification,
    #[serde(rename = "storage_physical_relationship_instance_created_notification")]
    PhysicalRelationshipInstanceCreatedNotification,
    #[serde(rename = "storage_physical_relationship_instance_deleted_notification")]
    PhysicalRelationshipInstanceDeletedNotification,
    #[serde(rename = "storage_life_cycle_event")]
    LifeCycleEvent,
    #[serde(rename = "storage_stats")]
    StorageStats,
}

impl QueryResourceType {
    /// All resource types, in declaration order.
    pub const ALL: [QueryResourceType; 12] = [
        Self::PhysicalAssetPropertyVariation,
        Self::PhysicalAssetEventNotification,
        Self::PhysicalActionRequest,
        Self::DigitalActionRequest,
        Self::DigitalTwinState,
        Self::DigitalTwinStateEventNotification,
        Self::NewPadNotification,
        Self::UpdatedPadNotification,
        Self::PhysicalRelationshipInstanceCreatedNotification,
        Self::PhysicalRelationshipInstanceDeletedNotification,
        Self::LifeCycleEvent,
        Self::StorageStats,
    ];

    /// Stable storage name of the resource.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PhysicalAssetPropertyVariation => "storage_physical_property_variation",
            Self::PhysicalAssetEventNotification => "storage_physical_event_notification",
            Self::PhysicalActionRequest => "storage_physical_action_request",
            Self::DigitalActionRequest => "storage_digital_action_request",
            Self::DigitalTwinState => "storage_dt_state",
            Self::DigitalTwinStateEventNotification => "storage_dt_state_event_notification",
            Self::NewPadNotification => "storage_new_pad_notification",
            Self::UpdatedPadNotification => "storage_updated_pad_notification",
            Self::PhysicalRelationshipInstanceCreatedNotification => {
                "storage_physical_relationship_instance_created_notification"
            }
            Self::PhysicalRelationshipInstanceDeletedNotification => {
                "storage_physical_relationship_instance_deleted_notification"
            }
            Self::LifeCycleEvent => "storage_life_cycle_event",
            Self::StorageStats => "storage_stats",
        }
    }
}

impl fmt::Display for QueryResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A storage query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Correlation id, unique per request.
    pub request_id: String,
    pub resource_type: QueryResourceType,
    pub request_type: QueryRequestType,
    pub start_timestamp_ms: u64,
    pub end_timestamp_ms: u64,
    pub start_index: usize,
    pub end_index: usize,
    /// Wall-clock creation time of the request.
    pub request_timestamp_ms: u64,
}

impl QueryRequest {
    /// Create a request with a fresh correlation id.
    #[must_use]
    pub fn new(resource_type: QueryResourceType, request_type: QueryRequestType) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            resource_type,
            request_type,
            start_timestamp_ms: 0,
            end_timestamp_ms: 0,
            start_index: 0,
            end_index: 0,
            request_timestamp_ms: current_time_ms(),
        }
    }

    #[must_use]
    pub fn last_value(resource_type: QueryResourceType) -> Self {
        Self::new(resource_type, QueryRequestType::LastValue)
    }

    #[must_use]
    pub fn count(resource_type: QueryResourceType) -> Self {
        Self::new(resource_type, QueryRequestType::Count)
    }

    #[must_use]
    pub fn time_range(resource_type: QueryResourceType, start_ms: u64, end_ms: u64) -> Self {
        let mut request = Self::new(resource_type, QueryRequestType::TimeRange);
        request.start_timestamp_ms = start_ms;
        request.end_timestamp_ms = end_ms;
        request
    }

    #[must_use]
    pub fn sample_range(resource_type: QueryResourceType, start_index: usize, end_index: usize) -> Self {
        let mut request = Self::new(resource_type, QueryRequestType::SampleRange);
        request.start_index = start_index;
        request.end_index = end_index;
        request
    }
}

/// Outcome of a storage query.
///
/// Exactly one result is produced per request, including on failure and on
/// timeout, so `successful == false` always comes with an `error_message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub original_request: QueryRequest,
    pub successful: bool,
    pub error_message: Option<String>,
    pub results: Vec<serde_json::Value>,
    pub total_results: usize,
}

impl QueryResult {
    /// Successful result carrying `results`.
    #[must_use]
    pub fn success(original_request: QueryRequest, results: Vec<serde_json::Value>) -> Self {
        let total_results = results.len();
        Self {
            original_request,
            successful: true,
            error_message: None,
            results,
            total_results,
        }
    }

    /// Successful result carrying a single value.
    #[must_use]
    pub fn single(original_request: QueryRequest, value: serde_json::Value) -> Self {
        Self::success(original_request, vec![value])
    }

    /// Failed result.
    #[must_use]
    pub fn failure(original_request: QueryRequest, error_message: impl Into<String>) -> Self {
        Self {
            original_request,
            successful: false,
            error_message: Some(error_message.into()),
            results: Vec::new(),
            total_results: 0,
        }
    }

    /// Correlation id of the request this result answers.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.original_request.request_id
    }
}
