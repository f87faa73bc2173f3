//! Error types for the query layer

use thiserror::Error;
use twin_bus::BusError;
use twin_types::{QueryRequestType, QueryResourceType, StorageError};

use crate::domain::config::ConfigError;

/// Errors raised while executing or answering a storage query.
///
/// Failures while answering a query reach the requester as a failed
/// `QueryResult` carrying the error's message. Only executor construction and
/// asynchronous dispatch return these as `Err`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Timeout waiting for query result on {topic} after {timeout_ms} ms")]
    Timeout { topic: String, timeout_ms: u64 },

    #[error("Unsupported {request_type:?} query for resource {resource}")]
    UnsupportedQuery {
        resource: QueryResourceType,
        request_type: QueryRequestType,
    },

    #[error("Query handling panicked: {0}")]
    Panicked(String),

    #[error("No storage available for tenant {0}")]
    NoStorageAvailable(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
