//! # Error Types
//!
//! Errors shared by the storage port and the capability description.

use thiserror::Error;

/// Errors returned by a storage backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A record could not be decoded or encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Index range is invalid for the stored records.
    #[error("Invalid range: start {start} end {end} (stored {len})")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// Start timestamp is after the end timestamp.
    #[error("Invalid time range: start {start_ms} is after end {end_ms}")]
    InvalidTimeRange { start_ms: u64, end_ms: u64 },

    /// Storage id already registered.
    #[error("Storage already registered: {0}")]
    AlreadyRegistered(String),

    /// Storage id not registered.
    #[error("Storage not found: {0}")]
    NotFound(String),

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// A malformed physical asset description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptionError {
    #[error("Empty {kind} key in physical asset description")]
    EmptyKey { kind: &'static str },

    #[error("Duplicate action key: {0}")]
    DuplicateAction(String),
}
