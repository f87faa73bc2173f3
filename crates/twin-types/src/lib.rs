//! # Twin Types Crate
//!
//! Domain types exchanged over the digital twin event bus.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every type carried in an event body by more
//!   than one crate is defined here.
//! - **Serialisable**: all types derive `serde` so they can be logged or bridged
//!   to an external transport without conversion.

pub mod description;
pub mod errors;
pub mod lifecycle;
pub mod query;

pub use description::*;
pub use errors::*;
pub use lifecycle::LifeCycleState;
pub use query::*;

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
