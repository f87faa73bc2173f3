//! Storage Port (Driven Port)
//!
//! The storage backend that records twin events and answers queries. The
//! query layer never sees how records are kept; it only asks for ranges,
//! counts and the latest record of a resource.

use serde_json::Value;
use twin_types::{QueryResourceType, StorageError};

/// A storage backend registered for one digital twin.
///
/// Calls are made on the bus dispatch thread, so implementations should
/// return promptly.
pub trait TwinStorage: Send + Sync {
    /// Identifier under which the storage is registered.
    fn storage_id(&self) -> &str;

    /// Append a record of `resource` taken at `timestamp_ms`.
    fn record(&self, resource: QueryResourceType, timestamp_ms: u64, value: Value) -> Result<(), StorageError>;

    /// Most recent record of `resource`, if any.
    fn last_value(&self, resource: QueryResourceType) -> Result<Option<Value>, StorageError>;

    /// Records with `start_ms <= timestamp <= end_ms`, oldest first.
    ///
    /// Fails with [`StorageError::InvalidTimeRange`] when `start_ms > end_ms`.
    fn time_range(&self, resource: QueryResourceType, start_ms: u64, end_ms: u64) -> Result<Vec<Value>, StorageError>;

    /// Records at positions `start_index..=end_index`, oldest first.
    ///
    /// Fails with [`StorageError::InvalidRange`] when `start_index > end_index`
    /// or `end_index` is past the last record.
    fn sample_range(
        &self,
        resource: QueryResourceType,
        start_index: usize,
        end_index: usize,
    ) -> Result<Vec<Value>, StorageError>;

    /// Number of stored records of `resource`.
    fn count(&self, resource: QueryResourceType) -> Result<usize, StorageError>;

    /// Summary of the storage content.
    fn stats(&self) -> Result<Value, StorageError>;
}
