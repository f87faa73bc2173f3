//! # Twin Telemetry
//!
//! Logging setup and Prometheus metrics for the digital twin runtime.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use twin_bus::EventBus;
//! use twin_telemetry::{init_logging, BusMetrics, MetricsEventLogger, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//!
//! let metrics = Arc::new(BusMetrics::new()?);
//! let bus = EventBus::with_logger(Arc::new(MetricsEventLogger::new(metrics.clone())));
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DT_SERVICE_NAME` / `OTEL_SERVICE_NAME` | `digital-twin` | Service name in logs |
//! | `DT_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `DT_CONSOLE_OUTPUT` | `true` | Console output |
//! | `DT_JSON_LOGS` | `false` | JSON log format |

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{BusMetrics, MetricsEventLogger};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
