//! # Twin Adapter
//!
//! Binding protocol between a physical adapter and its digital twin.
//!
//! A physical adapter announces what it can do through a
//! [`PhysicalAssetDescription`](twin_types::PhysicalAssetDescription). The
//! [`PhysicalAdapterBinding`] turns every exposed action key into an
//! action-trigger subscription (`dt.physical.event.action.<key>`), keeps those
//! subscriptions in step with the latest description, and reports binding
//! changes to a [`PhysicalAdapterListener`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod binding;
pub mod error;
pub mod ports;

pub use binding::{BindingState, PhysicalAdapterBinding};
pub use error::AdapterError;
pub use ports::{PhysicalAdapter, PhysicalAdapterListener};
