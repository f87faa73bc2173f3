//! Prometheus metrics for the event bus.
//!
//! All metrics follow the naming convention: `dt_event_bus_<metric>_<unit>`
//! and carry a `tenant` label.

use std::sync::Arc;

use prometheus::{exponential_buckets, Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use twin_bus::{BusError, Event, EventBusLogger};

use crate::TelemetryError;

fn counter(name: &str, help: &str) -> Result<IntCounterVec, TelemetryError> {
    IntCounterVec::new(Opts::new(name, help), &["tenant"]).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Bus counters, registered on their own [`Registry`].
#[derive(Clone)]
pub struct BusMetrics {
    registry: Registry,
    pub messages_published: IntCounterVec,
    pub messages_forwarded: IntCounterVec,
    pub subscriptions: IntCounterVec,
    pub unsubscriptions: IntCounterVec,
    pub dispatch_failures: IntCounterVec,
    /// Time from event creation to delivery
    pub delivery_latency: Histogram,
}

impl BusMetrics {
    /// Create the metrics on a fresh registry.
    pub fn new() -> Result<Self, TelemetryError> {
        Self::with_registry(Registry::new())
    }

    /// Create the metrics and register them on `registry`.
    pub fn with_registry(registry: Registry) -> Result<Self, TelemetryError> {
        let metrics = Self {
            messages_published: counter(
                "dt_event_bus_messages_published_total",
                "Events published on the bus",
            )?,
            messages_forwarded: counter(
                "dt_event_bus_messages_forwarded_total",
                "Events delivered to a subscriber",
            )?,
            subscriptions: counter("dt_event_bus_subscriptions_total", "Pattern registrations")?,
            unsubscriptions: counter("dt_event_bus_unsubscriptions_total", "Pattern removals")?,
            dispatch_failures: counter(
                "dt_event_bus_dispatch_failures_total",
                "Listener panics contained during delivery",
            )?,
            delivery_latency: Histogram::with_opts(
                HistogramOpts::new(
                    "dt_event_bus_delivery_latency_seconds",
                    "Time from event creation to delivery",
                )
                .buckets(
                    exponential_buckets(0.00001, 2.0, 14).map_err(|e| TelemetryError::MetricsInit(e.to_string()))?,
                ),
            )
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?,
            registry,
        };

        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(metrics.messages_published.clone()),
            Box::new(metrics.messages_forwarded.clone()),
            Box::new(metrics.subscriptions.clone()),
            Box::new(metrics.unsubscriptions.clone()),
            Box::new(metrics.dispatch_failures.clone()),
            Box::new(metrics.delivery_latency.clone()),
        ];
        for collector in collectors {
            metrics
                .registry
                .register(collector)
                .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        }
        Ok(metrics)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> Result<String, TelemetryError> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
    }
}

/// Bus logger that feeds [`BusMetrics`].
#[derive(Clone)]
pub struct MetricsEventLogger {
    metrics: Arc<BusMetrics>,
}

impl MetricsEventLogger {
    pub fn new(metrics: Arc<BusMetrics>) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &Arc<BusMetrics> {
        &self.metrics
    }
}

impl EventBusLogger for MetricsEventLogger {
    fn on_event_published(&self, tenant_id: &str, _publisher_id: &str, _event: &Event) {
        self.metrics.messages_published.with_label_values(&[tenant_id]).inc();
    }

    fn on_event_forwarded(&self, tenant_id: &str, _publisher_id: &str, _subscriber_id: &str, event: &Event) {
        self.metrics.messages_forwarded.with_label_values(&[tenant_id]).inc();
        self.metrics
            .delivery_latency
            .observe(event.created_at().elapsed().as_secs_f64());
    }

    fn on_client_subscription(&self, tenant_id: &str, _subscriber_id: &str, _pattern: &str) {
        self.metrics.subscriptions.with_label_values(&[tenant_id]).inc();
    }

    fn on_client_unsubscription(&self, tenant_id: &str, _subscriber_id: &str, _pattern: &str) {
        self.metrics.unsubscriptions.with_label_values(&[tenant_id]).inc();
    }

    fn on_dispatch_failure(&self, tenant_id: &str, _failure: &BusError) {
        self.metrics.dispatch_failures.with_label_values(&[tenant_id]).inc();
    }
}
