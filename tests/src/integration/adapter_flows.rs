//! # Adapter Flows
//!
//! A physical adapter bound to a live twin: binding announcements reach the
//! twin's observers, action triggers reach the adapter, physical events are
//! recorded by the storage manager and queryable through the executor.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use twin_adapter::{AdapterError, BindingState, PhysicalAdapter, PhysicalAdapterBinding, PhysicalAdapterListener};
    use twin_bus::{topics, Event, EventBus, EventObserver, EventObserverListener};
    use twin_query::{InMemoryStorage, QueryConfig, QueryExecutor, StorageManager};
    use twin_telemetry::{BusMetrics, MetricsEventLogger};
    use twin_types::{
        PhysicalAssetAction, PhysicalAssetDescription, PhysicalAssetProperty, QueryRequest, QueryResourceType,
    };

    const TWIN: &str = "lamp-twin";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Lamp that switches on request and reports its power property.
    #[derive(Default)]
    struct Lamp {
        triggered: Mutex<Vec<String>>,
    }

    impl Lamp {
        fn description(actions: &[&str]) -> PhysicalAssetDescription {
            actions
                .iter()
                .fold(PhysicalAssetDescription::new(), |pad, key| {
                    pad.with_action(PhysicalAssetAction::new(*key, "lamp.switch", "application/json"))
                })
                .with_property(PhysicalAssetProperty::new("power", json!("off")))
        }
    }

    impl PhysicalAdapter for Lamp {
        fn on_adapter_start(&self, binding: &PhysicalAdapterBinding) -> Result<(), AdapterError> {
            binding.notify_bound(Self::description(&["switch-on", "switch-off"]))
        }

        fn on_adapter_stop(&self, _binding: &PhysicalAdapterBinding) -> Result<(), AdapterError> {
            Ok(())
        }

        fn on_incoming_physical_action(&self, binding: &PhysicalAdapterBinding, event: &Event) {
            self.triggered.lock().push(event.topic().to_string());
            let power = if event.topic().ends_with("switch-on") { "on" } else { "off" };
            if let Err(e) = binding.publish_property_variation("power", json!(power)) {
                panic!("property publish failed: {e}");
            }
        }
    }

    #[derive(Default)]
    struct LifeCycle {
        transitions: Mutex<Vec<String>>,
    }

    impl PhysicalAdapterListener for LifeCycle {
        fn on_physical_adapter_bound(&self, adapter_id: &str, pad: &PhysicalAssetDescription) {
            self.transitions
                .lock()
                .push(format!("bound {adapter_id} {}", pad.actions.len()));
        }

        fn on_physical_binding_update(&self, adapter_id: &str, pad: &PhysicalAssetDescription) {
            self.transitions
                .lock()
                .push(format!("updated {adapter_id} {}", pad.actions.len()));
        }

        fn on_physical_adapter_unbound(
            &self,
            adapter_id: &str,
            _pad: Option<&PhysicalAssetDescription>,
            error_message: Option<&str>,
        ) {
            self.transitions
                .lock()
                .push(format!("unbound {adapter_id} {}", error_message.unwrap_or("clean")));
        }
    }

    /// Twin-side shadowing: watches descriptions and property variations.
    #[derive(Default)]
    struct Shadowing {
        descriptions: Mutex<Vec<(String, Value)>>,
        properties: Mutex<Vec<Value>>,
    }

    impl EventObserverListener for Shadowing {
        fn on_physical_asset_description_event(&self, event: &Event) {
            let adapter_id = event
                .metadata_value(topics::METADATA_ADAPTER_ID)
                .cloned()
                .unwrap_or(Value::Null);
            self.descriptions
                .lock()
                .push((event.topic().to_string(), adapter_id));
        }

        fn on_physical_asset_event(&self, event: &Event) {
            if let Some(value) = event.body_as::<Value>() {
                self.properties.lock().push(value.clone());
            }
        }
    }

    struct Setup {
        bus: Arc<EventBus>,
        lamp: Arc<Lamp>,
        binding: PhysicalAdapterBinding,
        life_cycle: Arc<LifeCycle>,
    }

    fn setup(bus: Arc<EventBus>) -> Setup {
        let lamp = Arc::new(Lamp::default());
        let binding = PhysicalAdapterBinding::new(bus.clone(), TWIN, "lamp-adapter", lamp.clone()).unwrap();
        let life_cycle = Arc::new(LifeCycle::default());
        binding.set_listener(Some(life_cycle.clone()));
        Setup {
            bus,
            lamp,
            binding,
            life_cycle,
        }
    }

    fn trigger(bus: &EventBus, action: &str) -> usize {
        bus.publish(TWIN, "twin", Event::with_body(topics::physical_action_topic(action), json!({})))
            .unwrap()
    }

    // =============================================================================
    // BINDING PROTOCOL
    // =============================================================================

    #[test]
    fn test_rebind_clears_stale_subscriptions() {
        let Setup {
            bus, lamp, binding, ..
        } = setup(Arc::new(EventBus::new()));

        binding.notify_bound(Lamp::description(&["a", "b"])).unwrap();
        binding
            .notify_binding_update(Lamp::description(&["c"]))
            .unwrap();

        assert_eq!(trigger(&bus, "a"), 0);
        assert_eq!(trigger(&bus, "b"), 0);
        assert_eq!(trigger(&bus, "c"), 1);
        assert_eq!(*lamp.triggered.lock(), vec!["dt.physical.event.action.c"]);
    }

    #[test]
    fn test_twin_observes_binding_and_properties() {
        let Setup {
            bus,
            binding,
            life_cycle,
            ..
        } = setup(Arc::new(EventBus::new()));
        let shadowing = Arc::new(Shadowing::default());
        let observer = EventObserver::new(bus.clone(), TWIN, "shadowing", shadowing.clone()).unwrap();
        observer.observe_physical_asset_description_events().unwrap();
        observer.observe_physical_asset_events().unwrap();

        binding.start().unwrap();
        binding
            .notify_binding_update(Lamp::description(&["switch-on", "switch-off", "dim"]))
            .unwrap();
        trigger(&bus, "switch-on");
        binding.stop().unwrap();

        assert_eq!(
            *shadowing.descriptions.lock(),
            vec![
                (topics::PHYSICAL_ASSET_DESCRIPTION_AVAILABLE.to_string(), json!("lamp-adapter")),
                (topics::PHYSICAL_ASSET_DESCRIPTION_UPDATED.to_string(), json!("lamp-adapter")),
            ]
        );
        assert_eq!(*shadowing.properties.lock(), vec![json!("on")]);
        assert_eq!(
            *life_cycle.transitions.lock(),
            vec!["bound lamp-adapter 2", "updated lamp-adapter 3", "unbound lamp-adapter clean"]
        );
        assert_eq!(binding.state(), BindingState::Unbound);
        assert_eq!(trigger(&bus, "switch-on"), 0);
    }

    #[test]
    fn test_bad_description_reported_through_life_cycle() {
        let Setup {
            bus,
            binding,
            life_cycle,
            ..
        } = setup(Arc::new(EventBus::new()));
        binding.start().unwrap();

        let broken = PhysicalAssetDescription::new().with_action(PhysicalAssetAction::new("", "lamp.switch", "text/plain"));
        assert!(binding.notify_binding_update(broken).is_err());

        let transitions = life_cycle.transitions.lock();
        assert!(transitions
            .last()
            .unwrap()
            .starts_with("unbound lamp-adapter Malformed physical asset description"));
        assert!(!bus.has_subscribers(TWIN));
    }

    // =============================================================================
    // END TO END
    // =============================================================================

    #[test]
    fn test_actions_recorded_and_queryable() {
        let metrics = Arc::new(BusMetrics::new().unwrap());
        let bus = Arc::new(EventBus::with_logger(Arc::new(MetricsEventLogger::new(metrics.clone()))));

        let manager = StorageManager::new(bus.clone(), TWIN);
        manager.put_storage(Arc::new(InMemoryStorage::new("memory"))).unwrap();
        manager.start().unwrap();

        let Setup { binding, .. } = setup(bus.clone());
        binding.start().unwrap();
        trigger(&bus, "switch-on");
        trigger(&bus, "switch-off");
        trigger(&bus, "switch-on");

        let executor = QueryExecutor::new(bus.clone(), TWIN, "dashboard", QueryConfig::default()).unwrap();
        let actions = executor.sync_query_execute(QueryRequest::count(QueryResourceType::PhysicalActionRequest));
        assert_eq!(actions.results, vec![json!(3)]);

        let powers = executor.sync_query_execute(QueryRequest::sample_range(
            QueryResourceType::PhysicalAssetPropertyVariation,
            0,
            2,
        ));
        let bodies: Vec<&Value> = powers.results.iter().map(|r| &r["body"]).collect();
        assert_eq!(bodies, vec![&json!("on"), &json!("off"), &json!("on")]);
        assert_eq!(powers.results[0]["metadata"]["adapter_id"], "lamp-adapter");

        let pads = executor.sync_query_execute(QueryRequest::count(QueryResourceType::NewPadNotification));
        assert_eq!(pads.results, vec![json!(1)]);

        let published = metrics.messages_published.with_label_values(&[TWIN]).get();
        assert!(published >= 10);
        assert_eq!(metrics.dispatch_failures.with_label_values(&[TWIN]).get(), 0);
    }
}
