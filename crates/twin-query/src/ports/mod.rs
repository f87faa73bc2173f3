//! Ports Layer - traits the query layer depends on.

pub mod storage;

pub use storage::TwinStorage;
