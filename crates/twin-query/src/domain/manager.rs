//! # Query Manager
//!
//! Answers a `QueryRequest` against the storages registered for a twin.
//!
//! ## Supported Requests
//!
//! | Resource                                  | Request types                                    |
//! |-------------------------------------------|--------------------------------------------------|
//! | `DIGITAL_TWIN_STATE`, `LIFE_CYCLE_EVENT`  | `LAST_VALUE`, `TIME_RANGE`, `SAMPLE_RANGE`, `COUNT` |
//! | `STORAGE_STATS`                           | `LAST_VALUE`                                     |
//! | every other resource                      | `TIME_RANGE`, `SAMPLE_RANGE`, `COUNT`            |
//!
//! `COUNT` answers with a single value, so its `total_results` is 1.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};
use twin_bus::panic_message;
use twin_types::{QueryRequest, QueryRequestType, QueryResourceType, QueryResult};

use crate::error::QueryError;
use crate::ports::TwinStorage;

use twin_types::QueryRequestType::{Count, LastValue, SampleRange, TimeRange};

/// Request types answered for `resource`.
#[must_use]
pub fn supported_request_types(resource: QueryResourceType) -> &'static [QueryRequestType] {
    match resource {
        QueryResourceType::DigitalTwinState | QueryResourceType::LifeCycleEvent => {
            &[LastValue, TimeRange, SampleRange, Count]
        }
        QueryResourceType::StorageStats => &[LastValue],
        _ => &[TimeRange, SampleRange, Count],
    }
}

/// Run `request` against `storage`.
pub fn execute_query(request: &QueryRequest, storage: &dyn TwinStorage) -> Result<QueryResult, QueryError> {
    let resource = request.resource_type;
    if !supported_request_types(resource).contains(&request.request_type) {
        return Err(QueryError::UnsupportedQuery {
            resource,
            request_type: request.request_type,
        });
    }

    let results = match request.request_type {
        LastValue if resource == QueryResourceType::StorageStats => vec![storage.stats()?],
        LastValue => storage.last_value(resource)?.into_iter().collect(),
        TimeRange => storage.time_range(resource, request.start_timestamp_ms, request.end_timestamp_ms)?,
        SampleRange => storage.sample_range(resource, request.start_index, request.end_index)?,
        Count => {
            let count = storage.count(resource)?;
            return Ok(QueryResult::single(request.clone(), json!(count)));
        }
    };
    Ok(QueryResult::success(request.clone(), results))
}

/// Selects a storage and answers queries against it.
///
/// Both methods have default bodies; override `target_storage` to route
/// queries differently.
pub trait QueryManager: Send + Sync {
    /// Storage that answers `request`. Defaults to the first registered one.
    fn target_storage<'a>(
        &self,
        _request: &QueryRequest,
        storages: &'a [Arc<dyn TwinStorage>],
    ) -> Option<&'a Arc<dyn TwinStorage>> {
        storages.first()
    }

    /// Answer `request`. Never fails: every error, and a panicking storage,
    /// becomes a failed result.
    fn handle_query(&self, tenant_id: &str, request: &QueryRequest, storages: &[Arc<dyn TwinStorage>]) -> QueryResult {
        let Some(storage) = self.target_storage(request, storages) else {
            let error = QueryError::NoStorageAvailable(tenant_id.to_string());
            warn!(tenant = tenant_id, request_id = %request.request_id, "{error}");
            return QueryResult::failure(request.clone(), error.to_string());
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| execute_query(request, storage.as_ref())))
            .unwrap_or_else(|payload| Err(QueryError::Panicked(panic_message(payload.as_ref()))));
        match outcome {
            Ok(result) => {
                debug!(
                    tenant = tenant_id,
                    request_id = %request.request_id,
                    storage = storage.storage_id(),
                    total = result.total_results,
                    "Query answered"
                );
                result
            }
            Err(e) => {
                warn!(
                    tenant = tenant_id,
                    request_id = %request.request_id,
                    storage = storage.storage_id(),
                    error = %e,
                    "Query failed"
                );
                QueryResult::failure(request.clone(), e.to_string())
            }
        }
    }
}

/// Query manager with the default storage selection.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultQueryManager;

impl QueryManager for DefaultQueryManager {}
