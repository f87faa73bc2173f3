//! In-memory storage adapter.

use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use twin_types::{QueryResourceType, StorageError};

use crate::ports::TwinStorage;

#[derive(Debug, Clone)]
struct StoredRecord {
    timestamp_ms: u64,
    value: Value,
}

/// Storage keeping every record in memory, in arrival order.
#[derive(Debug)]
pub struct InMemoryStorage {
    id: String,
    records: RwLock<HashMap<QueryResourceType, Vec<StoredRecord>>>,
}

impl InMemoryStorage {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Total records across all resources.
    pub fn len(&self) -> usize {
        self.records.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TwinStorage for InMemoryStorage {
    fn storage_id(&self) -> &str {
        &self.id
    }

    fn record(&self, resource: QueryResourceType, timestamp_ms: u64, value: Value) -> Result<(), StorageError> {
        self.records
            .write()
            .entry(resource)
            .or_default()
            .push(StoredRecord { timestamp_ms, value });
        Ok(())
    }

    fn last_value(&self, resource: QueryResourceType) -> Result<Option<Value>, StorageError> {
        Ok(self
            .records
            .read()
            .get(&resource)
            .and_then(|records| records.last())
            .map(|r| r.value.clone()))
    }

    fn time_range(&self, resource: QueryResourceType, start_ms: u64, end_ms: u64) -> Result<Vec<Value>, StorageError> {
        if start_ms > end_ms {
            return Err(StorageError::InvalidTimeRange { start_ms, end_ms });
        }
        Ok(self
            .records
            .read()
            .get(&resource)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| r.timestamp_ms >= start_ms && r.timestamp_ms <= end_ms)
                    .map(|r| r.value.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn sample_range(
        &self,
        resource: QueryResourceType,
        start_index: usize,
        end_index: usize,
    ) -> Result<Vec<Value>, StorageError> {
        let records = self.records.read();
        let stored = records.get(&resource).map_or(&[][..], Vec::as_slice);
        if start_index > end_index || end_index >= stored.len() {
            return Err(StorageError::InvalidRange {
                start: start_index,
                end: end_index,
                len: stored.len(),
            });
        }
        Ok(stored[start_index..=end_index]
            .iter()
            .map(|r| r.value.clone())
            .collect())
    }

    fn count(&self, resource: QueryResourceType) -> Result<usize, StorageError> {
        Ok(self.records.read().get(&resource).map_or(0, Vec::len))
    }

    fn stats(&self) -> Result<Value, StorageError> {
        let records = self.records.read();
        let mut per_resource = Map::new();
        for resource in QueryResourceType::ALL {
            let stored = records.get(&resource).map_or(&[][..], Vec::as_slice);
            per_resource.insert(
                resource.as_str().to_string(),
                json!({
                    "count": stored.len(),
                    "first_timestamp_ms": stored.first().map(|r| r.timestamp_ms),
                    "last_timestamp_ms": stored.last().map(|r| r.timestamp_ms),
                }),
            );
        }
        Ok(json!({
            "storage_id": self.id,
            "resources": per_resource,
        }))
    }
}
