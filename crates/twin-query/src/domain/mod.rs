//! Domain Layer - configuration, pending-query bookkeeping and query answering.

pub mod config;
pub mod manager;
pub mod pending;

pub use config::{ConfigError, QueryConfig, DEFAULT_QUERY_TIMEOUT_MS};
pub use manager::{execute_query, supported_request_types, DefaultQueryManager, QueryManager};
pub use pending::{PendingQuery, PendingQueryStore, PendingStats, QueryCallback};
