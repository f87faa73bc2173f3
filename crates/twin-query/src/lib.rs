//! # Twin Query
//!
//! Storage queries over the digital twin event bus.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   dt.storage.query.request     ┌────────────────┐
//! │ QueryExecutor │ ─────────────────────────────> │ StorageManager │
//! │               │ <───────────────────────────── │  QueryManager  │
//! └───────────────┘ dt.storage.query.result.<id>   │  TwinStorage*  │
//!                                                  └────────────────┘
//! ```
//!
//! - `domain/` - configuration, pending-query bookkeeping, query answering
//! - `ports/` - the [`TwinStorage`] backend trait
//! - `adapters/` - [`InMemoryStorage`]
//! - `service/` - [`StorageManager`] (responder) and [`QueryExecutor`] (client)
//!
//! The request id of a [`twin_types::QueryRequest`] is the correlation key:
//! it names the reply topic and keys the pending callbacks.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use adapters::InMemoryStorage;
pub use domain::{
    execute_query, supported_request_types, ConfigError, DefaultQueryManager, PendingStats, QueryConfig,
    QueryManager, DEFAULT_QUERY_TIMEOUT_MS,
};
pub use error::QueryError;
pub use ports::TwinStorage;
pub use service::{cleanup_task, QueryExecutor, QueryResultListener, StorageManager};
