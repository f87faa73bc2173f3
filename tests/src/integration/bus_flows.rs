//! # Bus Flows
//!
//! Routing guarantees of the event bus as seen by independent components:
//! idempotent registration, tenant isolation, wildcard routing, removal,
//! panic containment and re-entrant subscription changes.

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::timeout;
    use tokio_stream::StreamExt;
    use twin_bus::{
        topics, Event, EventBus, EventCategory, EventListener, EventObserver, EventObserverListener, SharedListener,
        TopicFilter,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    #[derive(Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    impl Counter {
        fn hits(&self) -> usize {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl EventListener for Counter {
        fn on_event(&self, _event: &Event) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Arc<Counter>, SharedListener) {
        let counter = Arc::new(Counter::default());
        let listener: SharedListener = counter.clone();
        (counter, listener)
    }

    fn filter(patterns: &[&str]) -> TopicFilter {
        TopicFilter::from_patterns(patterns.iter().copied())
    }

    // =============================================================================
    // ROUTING
    // =============================================================================

    #[test]
    fn test_idempotent_subscribe_delivers_once() {
        let bus = EventBus::new();
        let (counter, listener) = counting();
        let topic = filter(&[topics::STATE_UPDATE]);

        assert_eq!(bus.subscribe("A", "twin", &topic, &listener).unwrap(), 1);
        assert_eq!(bus.subscribe("A", "twin", &topic, &listener).unwrap(), 0);

        assert_eq!(bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap(), 1);
        assert_eq!(counter.hits(), 1);
    }

    #[test]
    fn test_tenant_isolation() {
        let bus = EventBus::new();
        let (in_a, listener_a) = counting();
        let (in_b, listener_b) = counting();
        bus.subscribe("A", "twin", &filter(&["t1"]), &listener_a).unwrap();
        bus.subscribe("B", "twin", &filter(&["t1"]), &listener_b).unwrap();

        bus.publish("A", "p", Event::new("t1")).unwrap();

        assert_eq!(in_a.hits(), 1);
        assert_eq!(in_b.hits(), 0);
    }

    #[test]
    fn test_wildcard_routing_both_directions() {
        let bus = EventBus::new();
        let (counter, listener) = counting();
        bus.subscribe("A", "twin", &filter(&[topics::ALL_PHYSICAL_PROPERTY_VARIATION]), &listener)
            .unwrap();

        for topic in [
            "dt.physical.event.property.temperature",
            "dt.physical.event.property.temperature.raw",
            "dt.physical.event.property",
        ] {
            assert_eq!(bus.publish("A", "p", Event::new(topic)).unwrap(), 1, "{topic}");
        }
        for topic in ["dt.physical.event.propertyX", "dt.physical.event", "dt.physical.event.event.alarm"] {
            assert_eq!(bus.publish("A", "p", Event::new(topic)).unwrap(), 0, "{topic}");
        }
        assert_eq!(counter.hits(), 3);
    }

    #[test]
    fn test_unsubscribe_removes_routing() {
        let bus = EventBus::new();
        let (counter, listener) = counting();
        let (other, other_listener) = counting();
        let topic = filter(&[topics::LIFE_CYCLE]);
        bus.subscribe("A", "first", &topic, &listener).unwrap();
        bus.subscribe("A", "second", &topic, &other_listener).unwrap();

        bus.unsubscribe("A", "first", &topic, &listener).unwrap();
        bus.publish("A", "p", Event::new(topics::LIFE_CYCLE)).unwrap();

        assert_eq!(counter.hits(), 0);
        assert_eq!(other.hits(), 1);
    }

    #[test]
    fn test_panicking_listener_is_contained() {
        struct Exploding;
        impl EventListener for Exploding {
            fn on_event(&self, _event: &Event) {
                panic!("listener failure");
            }
        }

        let bus = EventBus::new();
        let exploding: SharedListener = Arc::new(Exploding);
        let (counter, listener) = counting();
        let topic = filter(&[topics::STATE_UPDATE]);
        bus.subscribe("A", "bad", &topic, &exploding).unwrap();
        bus.subscribe("A", "good", &topic, &listener).unwrap();

        let forwarded = bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap();

        assert_eq!(forwarded, 1);
        assert_eq!(counter.hits(), 1);
        assert_eq!(bus.dispatch_failures(), 1);
    }

    #[test]
    fn test_listener_unsubscribes_itself() {
        struct OneShot {
            bus: Arc<EventBus>,
            me: Mutex<Option<SharedListener>>,
            hits: AtomicUsize,
        }
        impl EventListener for OneShot {
            fn on_event(&self, _event: &Event) {
                self.hits.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = self.me.lock().take() {
                    self.bus
                        .unsubscribe("A", "one-shot", &filter(&[topics::STATE_UPDATE]), &me)
                        .unwrap();
                }
            }
        }

        let bus = Arc::new(EventBus::new());
        let one_shot = Arc::new(OneShot {
            bus: bus.clone(),
            me: Mutex::new(None),
            hits: AtomicUsize::new(0),
        });
        let listener: SharedListener = one_shot.clone();
        *one_shot.me.lock() = Some(listener.clone());
        bus.subscribe("A", "one-shot", &filter(&[topics::STATE_UPDATE]), &listener)
            .unwrap();

        bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap();
        bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap();

        assert_eq!(one_shot.hits.load(Ordering::SeqCst), 1);
        assert!(!bus.has_subscribers("A"));
    }

    // =============================================================================
    // OBSERVER AND STREAMS
    // =============================================================================

    #[derive(Default)]
    struct CategoryLog {
        seen: Mutex<Vec<(&'static str, String)>>,
    }

    impl EventObserverListener for CategoryLog {
        fn on_state_event(&self, event: &Event) {
            self.seen.lock().push(("state", event.topic().to_string()));
        }

        fn on_physical_asset_event(&self, event: &Event) {
            self.seen.lock().push(("physical", event.topic().to_string()));
        }

        fn on_digital_action_event(&self, event: &Event) {
            self.seen.lock().push(("digital", event.topic().to_string()));
        }
    }

    #[test]
    fn test_observer_routes_categories() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(CategoryLog::default());
        let observer = EventObserver::new(bus.clone(), "A", "observer", log.clone()).unwrap();
        observer.observe_state_events().unwrap();
        observer.observe_physical_asset_events().unwrap();

        bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap();
        bus.publish("A", "p", Event::new(topics::physical_property_topic("temp")))
            .unwrap();
        bus.publish("A", "p", Event::new(topics::digital_action_topic("open")))
            .unwrap();

        observer.unobserve(EventCategory::State).unwrap();
        bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap();

        assert_eq!(
            *log.seen.lock(),
            vec![
                ("state", topics::STATE_UPDATE.to_string()),
                ("physical", "dt.physical.event.property.temp".to_string()),
            ]
        );

        drop(observer);
        assert!(!bus.has_subscribers("A"));
    }

    #[tokio::test]
    async fn test_stream_receives_events_from_other_threads() {
        let bus = Arc::new(EventBus::new());
        let stream = bus
            .event_stream("A", "consumer", filter(&[topics::ALL_STATE_EVENT_NOTIFICATION]))
            .unwrap()
            .into_stream();

        let publisher = bus.clone();
        std::thread::spawn(move || {
            for key in ["alarm", "warning", "info"] {
                publisher
                    .publish("A", "p", Event::new(topics::state_event_notification_topic(key)))
                    .unwrap();
            }
        });

        let topics_seen: Vec<String> = timeout(
            Duration::from_secs(2),
            stream.take(3).map(|event| event.topic().to_string()).collect::<Vec<_>>(),
        )
        .await
        .expect("three notifications");

        assert_eq!(
            topics_seen,
            vec![
                "dt.state.event.notification.alarm",
                "dt.state.event.notification.warning",
                "dt.state.event.notification.info",
            ]
        );
    }

    #[test]
    fn test_concurrent_publishers_and_subscribers() {
        let bus = Arc::new(EventBus::new());
        let (counter, listener) = counting();
        bus.subscribe("A", "sink", &filter(&["dt.*"]), &listener).unwrap();

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let bus = bus.clone();
                std::thread::spawn(move || {
                    let (_churn, churn_listener) = counting();
                    let topic = format!("dt.worker.{worker}");
                    let own = filter(&[topic.as_str()]);
                    for _ in 0..100 {
                        bus.subscribe("A", "churn", &own, &churn_listener).unwrap();
                        bus.publish("A", "p", Event::new(topics::STATE_UPDATE)).unwrap();
                        bus.unsubscribe("A", "churn", &own, &churn_listener).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(counter.hits(), 400);
        assert_eq!(bus.subscriber_count("A", "dt.*"), 1);
    }
}
