//! # Query Flows
//!
//! Round trips between a `QueryExecutor` and a running `StorageManager` over
//! one shared bus.
//!
//! ## Flow Tested
//!
//! 1. Twin events are published and recorded by the storage manager
//! 2. The executor publishes a `QueryRequest` on `dt.storage.query.request`
//! 3. The manager answers on `dt.storage.query.result.<request_id>`
//! 4. The executor hands the result back and releases the reply topic

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use parking_lot::Mutex;
    use serde_json::json;
    use twin_bus::notify::publish_life_cycle_event;
    use twin_bus::{topics, Event, EventBus};
    use twin_query::{
        InMemoryStorage, QueryConfig, QueryExecutor, QueryManager, QueryResultListener, StorageManager, TwinStorage,
        DEFAULT_QUERY_TIMEOUT_MS,
    };
    use twin_types::{LifeCycleState, QueryRequest, QueryResourceType, QueryResult, StorageError};

    const TWIN: &str = "twin-42";

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Twin {
        bus: Arc<EventBus>,
        manager: StorageManager,
        storage: Arc<InMemoryStorage>,
    }

    impl Twin {
        fn running() -> Self {
            let bus = Arc::new(EventBus::new());
            let manager = StorageManager::new(bus.clone(), TWIN);
            let storage = Arc::new(InMemoryStorage::new("primary"));
            manager.put_storage(storage.clone()).unwrap();
            manager.start().unwrap();
            Self { bus, manager, storage }
        }

        fn update_state(&self, state: serde_json::Value) {
            self.bus
                .publish(TWIN, "shadowing", Event::with_body(topics::STATE_UPDATE, state))
                .unwrap();
        }

        fn executor(&self, config: QueryConfig) -> QueryExecutor {
            QueryExecutor::new(self.bus.clone(), TWIN, "client", config).unwrap()
        }
    }

    fn fast_timeout() -> QueryConfig {
        QueryConfig {
            query_timeout: Duration::from_millis(40),
            pending_ttl: Duration::from_millis(40),
            cleanup_interval: Duration::from_millis(10),
        }
    }

    // =============================================================================
    // ROUND TRIPS
    // =============================================================================

    #[test]
    fn test_last_value_round_trip() {
        let twin = Twin::running();
        twin.update_state(json!({"temperature": 20}));
        twin.update_state(json!({"temperature": 21}));

        let executor = twin.executor(QueryConfig::default());
        let request = QueryRequest::last_value(QueryResourceType::DigitalTwinState);
        let result = executor.sync_query_execute(request.clone());

        assert!(result.successful);
        assert_eq!(result.original_request, request);
        assert_eq!(result.total_results, 1);
        assert_eq!(result.results[0]["body"], json!({"temperature": 21}));
        assert_eq!(result.results[0]["topic"], topics::STATE_UPDATE);
    }

    #[test]
    fn test_time_and_sample_ranges() {
        let twin = Twin::running();
        for state in ["created", "started", "bound"] {
            twin.storage
                .record(QueryResourceType::LifeCycleEvent, 0, json!(state))
                .unwrap();
        }
        publish_life_cycle_event(&twin.bus, TWIN, "twin", LifeCycleState::Synchronized).unwrap();
        let executor = twin.executor(QueryConfig::default());

        let samples = executor.sync_query_execute(QueryRequest::sample_range(QueryResourceType::LifeCycleEvent, 1, 3));
        assert!(samples.successful);
        assert_eq!(samples.total_results, 3);
        assert_eq!(samples.results[2]["body"], "synchronized");

        let early = executor.sync_query_execute(QueryRequest::time_range(QueryResourceType::LifeCycleEvent, 0, 0));
        assert_eq!(early.results, vec![json!("created"), json!("started"), json!("bound")]);

        let count = executor.sync_query_execute(QueryRequest::count(QueryResourceType::LifeCycleEvent));
        assert_eq!(count.results, vec![json!(4)]);
    }

    #[test]
    fn test_failures_are_answered_not_thrown() {
        let twin = Twin::running();
        let executor = twin.executor(QueryConfig::default());

        let out_of_range =
            executor.sync_query_execute(QueryRequest::sample_range(QueryResourceType::DigitalTwinState, 0, 10));
        assert!(!out_of_range.successful);
        assert!(out_of_range.error_message.unwrap().contains("Invalid range"));

        let unsupported =
            executor.sync_query_execute(QueryRequest::last_value(QueryResourceType::PhysicalActionRequest));
        assert!(!unsupported.successful);
        assert!(unsupported
            .error_message
            .unwrap()
            .contains(QueryResourceType::PhysicalActionRequest.as_str()));

        twin.manager.remove_storage("primary").unwrap();
        let empty = executor.sync_query_execute(QueryRequest::count(QueryResourceType::DigitalTwinState));
        assert!(empty.error_message.unwrap().contains("No storage available"));
    }

    #[test]
    fn test_storage_stats() {
        let twin = Twin::running();
        twin.update_state(json!(1));
        let executor = twin.executor(QueryConfig::default());

        let stats = executor.sync_query_execute(QueryRequest::last_value(QueryResourceType::StorageStats));
        assert!(stats.successful);
        assert_eq!(stats.results[0]["storage_id"], "primary");
        assert_eq!(stats.results[0]["resources"]["storage_dt_state"]["count"], 1);
    }

    // =============================================================================
    // TIMEOUTS
    // =============================================================================

    #[test]
    fn test_timeout_without_responder() {
        let twin = Twin::running();
        twin.manager.stop().unwrap();
        let executor = twin.executor(fast_timeout());

        let started = Instant::now();
        let result = executor.sync_query_execute(QueryRequest::last_value(QueryResourceType::DigitalTwinState));

        assert!(started.elapsed() >= Duration::from_millis(40));
        assert!(!result.successful);
        assert!(result.error_message.unwrap().to_lowercase().contains("timeout"));
        assert!(!twin.bus.has_subscribers(TWIN));
    }

    #[test]
    fn test_default_timeout_constant() {
        assert_eq!(DEFAULT_QUERY_TIMEOUT_MS, 5000);
        let twin = Twin::running();
        let executor = twin.executor(QueryConfig::default());
        assert_eq!(executor.config().query_timeout.as_millis(), 5000);
    }

    // =============================================================================
    // ASYNCHRONOUS QUERIES
    // =============================================================================

    #[test]
    fn test_async_callback_fires_exactly_once() {
        let twin = Twin::running();
        twin.update_state(json!("on"));
        let executor = twin.executor(QueryConfig::default());

        let seen: Arc<Mutex<Vec<QueryResult>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: Arc<dyn QueryResultListener> = Arc::new(move |result: QueryResult| sink.lock().push(result));

        let request = QueryRequest::last_value(QueryResourceType::DigitalTwinState);
        executor.async_query_execute(request.clone(), listener).unwrap();

        // A late duplicate reply finds nothing pending.
        twin_bus::notify::publish_query_result(
            &twin.bus,
            TWIN,
            "storage_manager",
            QueryResult::single(request.clone(), json!("late")),
        )
        .unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].results[0]["body"], "on");
        assert_eq!(executor.pending_count(), 0);
        assert_eq!(
            twin.bus
                .subscriber_count(TWIN, &topics::query_result_topic(&request.request_id)),
            0
        );
    }

    #[tokio::test]
    async fn test_async_timeout_through_cleanup_task() {
        let twin = Twin::running();
        twin.manager.stop().unwrap();
        let executor = Arc::new(twin.executor(fast_timeout()));
        let _cleanup = executor.spawn_cleanup();

        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let listener: Arc<dyn QueryResultListener> = Arc::new(move |result: QueryResult| {
            if let Some(tx) = tx.lock().take() {
                tx.send(result).unwrap();
            }
        });
        executor
            .async_query_execute(QueryRequest::count(QueryResourceType::DigitalTwinState), listener)
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), rx)
            .await
            .expect("expired result delivered")
            .unwrap();
        assert!(!result.successful);
        assert!(result.error_message.unwrap().contains("Timeout"));
        assert!(!twin.bus.has_subscribers(TWIN));
    }

    #[tokio::test]
    async fn test_awaited_queries_interleave() {
        let twin = Twin::running();
        twin.update_state(json!({"mode": "auto"}));
        let executor = twin.executor(QueryConfig::default());

        let (state, count) = tokio::join!(
            executor.query(QueryRequest::last_value(QueryResourceType::DigitalTwinState)),
            executor.query(QueryRequest::count(QueryResourceType::DigitalTwinState)),
        );
        assert_eq!(state.results[0]["body"]["mode"], "auto");
        assert_eq!(count.results, vec![json!(1)]);
    }

    #[test]
    fn test_concurrent_sync_queries_get_their_own_results() {
        let twin = Twin::running();
        for i in 0..10 {
            twin.storage
                .record(QueryResourceType::PhysicalAssetPropertyVariation, i, json!(i))
                .unwrap();
        }
        let executor = Arc::new(twin.executor(QueryConfig::with_timeout(Duration::from_secs(2))));

        let workers: Vec<_> = (0..8usize)
            .map(|i| {
                let executor = executor.clone();
                std::thread::spawn(move || {
                    let request = QueryRequest::sample_range(QueryResourceType::PhysicalAssetPropertyVariation, i, i);
                    let result = executor.sync_query_execute(request.clone());
                    (request.request_id, result)
                })
            })
            .collect();

        for (i, worker) in workers.into_iter().enumerate() {
            let (request_id, result) = worker.join().unwrap();
            assert_eq!(result.request_id(), request_id);
            assert_eq!(result.results, vec![json!(i)]);
        }
        assert_eq!(executor.pending_count(), 0);
    }

    #[test]
    fn test_panicking_storage_answers_at_once() {
        struct Exploding;
        impl TwinStorage for Exploding {
            fn storage_id(&self) -> &str {
                "exploding"
            }
            fn record(&self, _: QueryResourceType, _: u64, _: serde_json::Value) -> Result<(), StorageError> {
                Ok(())
            }
            fn last_value(&self, _: QueryResourceType) -> Result<Option<serde_json::Value>, StorageError> {
                panic!("backend exploded");
            }
            fn time_range(&self, _: QueryResourceType, _: u64, _: u64) -> Result<Vec<serde_json::Value>, StorageError> {
                Ok(Vec::new())
            }
            fn sample_range(
                &self,
                _: QueryResourceType,
                _: usize,
                _: usize,
            ) -> Result<Vec<serde_json::Value>, StorageError> {
                Ok(Vec::new())
            }
            fn count(&self, _: QueryResourceType) -> Result<usize, StorageError> {
                Ok(0)
            }
            fn stats(&self) -> Result<serde_json::Value, StorageError> {
                Ok(json!({}))
            }
        }

        let bus = Arc::new(EventBus::new());
        let manager = StorageManager::new(bus.clone(), TWIN);
        manager.put_storage(Arc::new(Exploding)).unwrap();
        manager.start().unwrap();
        let executor =
            QueryExecutor::new(bus, TWIN, "client", QueryConfig::with_timeout(Duration::from_millis(300))).unwrap();

        let started = Instant::now();
        let result = executor.sync_query_execute(QueryRequest::last_value(QueryResourceType::DigitalTwinState));

        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(!result.successful);
        assert!(result.error_message.unwrap().contains("backend exploded"));
    }

    // =============================================================================
    // CUSTOM STORAGE SELECTION
    // =============================================================================

    #[test]
    fn test_custom_query_manager() {
        struct ById(&'static str);
        impl QueryManager for ById {
            fn target_storage<'a>(
                &self,
                _request: &QueryRequest,
                storages: &'a [Arc<dyn TwinStorage>],
            ) -> Option<&'a Arc<dyn TwinStorage>> {
                storages.iter().find(|s| s.storage_id() == self.0)
            }
        }

        let twin = Twin::running();
        twin.manager
            .put_storage(Arc::new(InMemoryStorage::new("archive")))
            .unwrap();
        twin.manager.set_query_manager(Arc::new(ById("archive")));
        twin.update_state(json!("recorded in both"));
        twin.manager
            .get_storage("archive")
            .unwrap()
            .record(QueryResourceType::DigitalTwinState, 0, json!("archive only"))
            .unwrap();

        let executor = twin.executor(QueryConfig::default());
        let count = executor.sync_query_execute(QueryRequest::count(QueryResourceType::DigitalTwinState));
        assert_eq!(count.results, vec![json!(2)]);
    }
}
