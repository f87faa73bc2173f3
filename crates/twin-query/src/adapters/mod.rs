//! Adapters Layer - concrete storage backends.

pub mod memory;

pub use memory::InMemoryStorage;
