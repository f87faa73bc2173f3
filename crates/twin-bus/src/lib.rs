//! # Twin Bus - Event Bus for Digital Twin Components
//!
//! Process-local, multi-tenant, topic-addressed publish/subscribe.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │   Adapter    │                    │   Observer   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │ on_event()
//!                  │  Event Bus   │ ─────────┘
//!                  │ (per tenant) │
//!                  └──────────────┘
//! ```
//!
//! ## Delivery Rules
//!
//! - Every registration is scoped to a tenant (the digital twin id). Nothing
//!   published under one tenant reaches a subscriber of another.
//! - `publish` runs listener callbacks in-line on the publisher's thread, in
//!   registration order. There is no queue and no retry.
//! - A panicking listener is contained; delivery continues with the next one.
//! - Patterns ending in `.*` match the prefix and everything below it
//!   (see [`filter::topic_matches`]).
//!
//! The bus is an explicit object: build one with [`EventBus::new`] and hand an
//! `Arc<EventBus>` to every component that publishes or subscribes.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod error;
pub mod event;
pub mod filter;
pub mod listener;
pub mod logger;
pub mod notify;
pub mod observer;
pub mod subscriber;
pub mod topics;

// Re-export main types
pub use bus::{panic_message, EventBus};
pub use error::BusError;
pub use event::{Event, EventBody};
pub use filter::{is_wildcard_pattern, topic_matches, TopicFilter};
pub use listener::{EventListener, SharedListener};
pub use logger::{EventBusLogger, TracingEventLogger};
pub use observer::{EventCategory, EventObserver, EventObserverListener};
pub use subscriber::{EventStream, Subscription, SubscriptionError};
