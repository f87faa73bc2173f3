//! Service Layer - the storage responder and the query client.

pub mod query_executor;
pub mod storage_manager;

pub use query_executor::{cleanup_task, QueryExecutor, QueryResultListener};
pub use storage_manager::{event_record, resource_for_topic, StorageManager, STORAGE_MANAGER_ID};
