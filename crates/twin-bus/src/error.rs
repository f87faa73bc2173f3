//! Errors raised by the event bus.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// Misuse of the bus API: empty tenant, topic, subscriber id or filter.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A listener panicked while an event was delivered to it.
    ///
    /// Never returned from `publish`; it is logged and handed to the bus
    /// logger so delivery to the remaining subscribers can continue.
    #[error("Dispatch to subscriber {subscriber_id} failed on topic {topic}: {reason}")]
    DispatchFailure {
        subscriber_id: String,
        topic: String,
        reason: String,
    },
}

impl BusError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
