//! # Event Bus Benchmarks
//!
//! | Path | Measured |
//! |------|----------|
//! | Exact routing | publish to N exact-topic subscribers |
//! | Wildcard routing | publish through N wildcard subscribers |
//! | Registration | subscribe + unsubscribe of one filter |
//! | Query round trip | sync query answered by the storage manager |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use twin_bus::{topics, Event, EventBus, EventListener, SharedListener, TopicFilter};
use twin_query::{InMemoryStorage, QueryConfig, QueryExecutor, StorageManager};
use twin_types::{QueryRequest, QueryResourceType};

const TENANT: &str = "bench-twin";

struct Sink(AtomicU64);

impl EventListener for Sink {
    fn on_event(&self, _event: &Event) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }
}

fn sink() -> SharedListener {
    Arc::new(Sink(AtomicU64::new(0)))
}

// ============================================================================
// Routing
// ============================================================================

fn bench_publish_routing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bus-publish");

    for subscribers in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(subscribers as u64));

        let exact = EventBus::new();
        for i in 0..subscribers {
            let filter = TopicFilter::from_patterns([topics::STATE_UPDATE]);
            exact.subscribe(TENANT, &format!("sub-{i}"), &filter, &sink()).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("exact", subscribers), &exact, |b, bus| {
            b.iter(|| black_box(bus.publish(TENANT, "bench", Event::new(topics::STATE_UPDATE)).unwrap()))
        });

        let wildcard = EventBus::new();
        for i in 0..subscribers {
            let filter = TopicFilter::from_patterns([topics::ALL_PHYSICAL_PROPERTY_VARIATION]);
            wildcard.subscribe(TENANT, &format!("sub-{i}"), &filter, &sink()).unwrap();
        }
        let topic = topics::physical_property_topic("temperature");
        group.bench_with_input(BenchmarkId::new("wildcard", subscribers), &wildcard, |b, bus| {
            b.iter(|| black_box(bus.publish(TENANT, "bench", Event::new(topic.as_str())).unwrap()))
        });
    }

    group.finish();
}

fn bench_registration(c: &mut Criterion) {
    let bus = EventBus::new();
    let listener = sink();
    let filter = TopicFilter::from_patterns([topics::STATE_UPDATE, topics::ALL_STATE_EVENT_NOTIFICATION]);

    c.bench_function("bus-subscribe-unsubscribe", |b| {
        b.iter(|| {
            bus.subscribe(TENANT, "churn", &filter, &listener).unwrap();
            bus.unsubscribe(TENANT, "churn", &filter, &listener).unwrap();
        })
    });
}

// ============================================================================
// Query round trip
// ============================================================================

fn bench_sync_query(c: &mut Criterion) {
    let bus = Arc::new(EventBus::new());
    let manager = StorageManager::new(bus.clone(), TENANT);
    manager.put_storage(Arc::new(InMemoryStorage::new("memory"))).unwrap();
    manager.start().unwrap();
    bus.publish(TENANT, "bench", Event::with_body(topics::STATE_UPDATE, json!({"level": 3})))
        .unwrap();

    let executor = QueryExecutor::new(bus, TENANT, "bench", QueryConfig::default()).unwrap();
    c.bench_function("query-last-value-sync", |b| {
        b.iter(|| {
            let result = executor.sync_query_execute(QueryRequest::last_value(QueryResourceType::DigitalTwinState));
            black_box(result.successful)
        })
    });
}

criterion_group!(benches, bench_publish_routing, bench_registration, bench_sync_query);
criterion_main!(benches);
