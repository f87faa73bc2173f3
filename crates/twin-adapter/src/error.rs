//! Error types for the adapter binding protocol

use thiserror::Error;
use twin_bus::BusError;
use twin_types::DescriptionError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Malformed physical asset description: {0}")]
    InvalidDescription(#[from] DescriptionError),

    #[error("Adapter {0} is not bound")]
    NotBound(String),

    #[error("Empty {0} key")]
    EmptyKey(&'static str),

    /// Raised by an adapter's own start or stop hook.
    #[error("Adapter hook failed: {0}")]
    Hook(String),

    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}
