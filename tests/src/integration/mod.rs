//! Cross-crate integration flows.

pub mod adapter_flows;
pub mod bus_flows;
pub mod query_flows;
