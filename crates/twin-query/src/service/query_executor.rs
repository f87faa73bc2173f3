//! # Query Executor
//!
//! Client side of storage queries. A request is published on
//! `dt.storage.query.request`; the answer comes back on the per-request reply
//! topic `dt.storage.query.result.<request_id>`.
//!
//! ## Modes
//!
//! - [`QueryExecutor::sync_query_execute`] blocks the calling thread until the
//!   result arrives or the query timeout elapses.
//! - [`QueryExecutor::async_query_execute`] returns at once and hands the
//!   result to a [`QueryResultListener`].
//! - [`QueryExecutor::query`] awaits the result on a tokio runtime.
//!
//! Every accepted request yields exactly one `QueryResult`. Missing replies
//! turn into failed results carrying a timeout message.
//!
//! ## Blocking
//!
//! The bus delivers in-line, so a responder on the same bus answers before
//! `publish` returns and the sync call never waits. A responder that replies
//! from another thread must not need the thread blocked in
//! `sync_query_execute`; on a tokio worker prefer [`QueryExecutor::query`].

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use twin_bus::notify::publish_query_request;
use twin_bus::{topics, BusError, Event, EventBus, EventListener, SharedListener, TopicFilter};
use twin_types::{QueryRequest, QueryResult};

use crate::domain::{PendingQueryStore, PendingStats, QueryCallback, QueryConfig};
use crate::error::QueryError;

const NOT_A_QUERY_RESULT: &str = "event body is not a query result";

/// Receives the result of an asynchronous query.
pub trait QueryResultListener: Send + Sync {
    fn on_query_result(&self, result: QueryResult);
}

impl<F> QueryResultListener for F
where
    F: Fn(QueryResult) + Send + Sync,
{
    fn on_query_result(&self, result: QueryResult) {
        self(result)
    }
}

fn request_id_of(topic: &str) -> Option<&str> {
    topic
        .strip_prefix(topics::STORAGE_QUERY_RESULT_BASE)?
        .strip_prefix('.')
        .filter(|id| !id.is_empty())
}

fn reply_filter(request_id: &str) -> TopicFilter {
    TopicFilter::from_patterns([topics::query_result_topic(request_id)])
}

/// Single-shot reply slot of a blocking query.
struct SyncReply {
    request: QueryRequest,
    slot: Mutex<Option<QueryResult>>,
    ready: Condvar,
}

impl EventListener for SyncReply {
    fn on_event(&self, event: &Event) {
        let result = match event.body_as::<QueryResult>() {
            Some(result) => result.clone(),
            None => {
                warn!(topic = event.topic(), "{NOT_A_QUERY_RESULT}");
                QueryResult::failure(self.request.clone(), NOT_A_QUERY_RESULT)
            }
        };

        let mut slot = self.slot.lock();
        if slot.is_none() {
            *slot = Some(result);
            self.ready.notify_all();
        }
    }
}

/// Shared listener of every asynchronous reply topic of one executor.
struct ReplyListener {
    bus: Arc<EventBus>,
    tenant_id: String,
    executor_id: String,
    pending: Arc<PendingQueryStore>,
    me: Weak<ReplyListener>,
}

impl ReplyListener {
    /// Unsubscribe from the reply topic of `request_id`.
    fn release(&self, request_id: &str) {
        let Some(me) = self.me.upgrade() else {
            return;
        };
        let handle: SharedListener = me;
        if let Err(e) = self
            .bus
            .unsubscribe(&self.tenant_id, &self.executor_id, &reply_filter(request_id), &handle)
        {
            warn!(request_id, error = %e, "Failed to release reply topic");
        }
    }
}

impl EventListener for ReplyListener {
    fn on_event(&self, event: &Event) {
        let Some(request_id) = request_id_of(event.topic()) else {
            warn!(topic = event.topic(), "Reply on unexpected topic");
            return;
        };
        self.release(request_id);

        match event.body_as::<QueryResult>() {
            Some(result) => {
                self.pending.complete(result.clone());
            }
            None => {
                warn!(topic = event.topic(), "{NOT_A_QUERY_RESULT}");
                if let Some(pending) = self.pending.take(request_id) {
                    pending.fail(NOT_A_QUERY_RESULT);
                }
            }
        }
    }
}

/// Issues storage queries for one digital twin.
pub struct QueryExecutor {
    bus: Arc<EventBus>,
    tenant_id: String,
    executor_id: String,
    config: QueryConfig,
    pending: Arc<PendingQueryStore>,
    reply: Arc<ReplyListener>,
}

impl QueryExecutor {
    pub fn new(
        bus: Arc<EventBus>,
        tenant_id: impl Into<String>,
        executor_id: impl Into<String>,
        config: QueryConfig,
    ) -> Result<Self, QueryError> {
        config.validate()?;
        let tenant_id = tenant_id.into();
        let executor_id = executor_id.into();
        if tenant_id.is_empty() {
            return Err(BusError::InvalidArgument("tenant id must not be empty".into()).into());
        }
        if executor_id.is_empty() {
            return Err(BusError::InvalidArgument("executor id must not be empty".into()).into());
        }

        let pending = Arc::new(PendingQueryStore::new(config.pending_ttl));
        let reply = Arc::new_cyclic(|me| ReplyListener {
            bus: Arc::clone(&bus),
            tenant_id: tenant_id.clone(),
            executor_id: executor_id.clone(),
            pending: Arc::clone(&pending),
            me: me.clone(),
        });

        info!(tenant = %tenant_id, executor = %executor_id, "Query executor created");
        Ok(Self {
            bus,
            tenant_id,
            executor_id,
            config,
            pending,
            reply,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn timeout_error(&self, request_id: &str, timeout: Duration) -> QueryError {
        QueryError::Timeout {
            topic: topics::query_result_topic(request_id),
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Publish `request` and block until its result arrives.
    ///
    /// Never fails: bus errors and the timeout come back as failed results.
    pub fn sync_query_execute(&self, request: QueryRequest) -> QueryResult {
        let request_id = request.request_id.clone();
        let filter = reply_filter(&request_id);
        let reply = Arc::new(SyncReply {
            request: request.clone(),
            slot: Mutex::new(None),
            ready: Condvar::new(),
        });
        let handle: SharedListener = reply.clone();

        if let Err(e) = self.bus.subscribe(&self.tenant_id, &self.executor_id, &filter, &handle) {
            return QueryResult::failure(request, QueryError::from(e).to_string());
        }

        let deadline = Instant::now() + self.config.query_timeout;
        let outcome = match publish_query_request(&self.bus, &self.tenant_id, &self.executor_id, request.clone()) {
            Ok(_) => {
                let mut slot = reply.slot.lock();
                while slot.is_none() {
                    if reply.ready.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                slot.take()
            }
            Err(e) => Some(QueryResult::failure(request.clone(), QueryError::from(e).to_string())),
        };

        if let Err(e) = self.bus.unsubscribe(&self.tenant_id, &self.executor_id, &filter, &handle) {
            warn!(request_id = %request_id, error = %e, "Failed to release reply topic");
        }

        outcome.unwrap_or_else(|| {
            let error = self.timeout_error(&request_id, self.config.query_timeout);
            warn!(tenant = %self.tenant_id, request_id = %request_id, "{error}");
            QueryResult::failure(request, error.to_string())
        })
    }

    /// Register `callback`, subscribe to the reply topic and publish.
    fn dispatch(&self, request: QueryRequest, callback: QueryCallback) -> Result<(), QueryError> {
        let request_id = request.request_id.clone();
        let handle: SharedListener = self.reply.clone();

        // The responder may answer in-line during publish.
        self.pending.register(request.clone(), None, callback);
        if let Err(e) = self
            .bus
            .subscribe(&self.tenant_id, &self.executor_id, &reply_filter(&request_id), &handle)
        {
            self.pending.cancel(&request_id);
            return Err(e.into());
        }
        if let Err(e) = publish_query_request(&self.bus, &self.tenant_id, &self.executor_id, request) {
            self.pending.cancel(&request_id);
            self.reply.release(&request_id);
            return Err(e.into());
        }
        debug!(tenant = %self.tenant_id, request_id = %request_id, "Query dispatched");
        Ok(())
    }

    /// Publish `request` and return at once.
    ///
    /// `listener` receives exactly one result: the reply, or a failed result
    /// once the pending entry expires. On `Err` the request was not sent and
    /// the listener is never called.
    pub fn async_query_execute(
        &self,
        request: QueryRequest,
        listener: Arc<dyn QueryResultListener>,
    ) -> Result<(), QueryError> {
        self.dispatch(request, Box::new(move |result| listener.on_query_result(result)))
    }

    /// Publish `request` and await its result, bounded by the query timeout.
    pub async fn query(&self, request: QueryRequest) -> QueryResult {
        let request_id = request.request_id.clone();
        let (tx, rx) = oneshot::channel();
        let callback: QueryCallback = Box::new(move |result| {
            if tx.send(result).is_err() {
                debug!("Query result dropped, caller gone");
            }
        });

        if let Err(e) = self.dispatch(request.clone(), callback) {
            return QueryResult::failure(request, e.to_string());
        }

        match tokio::time::timeout(self.config.query_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => QueryResult::failure(request, "query abandoned before a result arrived"),
            Err(_) => {
                self.pending.cancel(&request_id);
                self.reply.release(&request_id);
                let error = self.timeout_error(&request_id, self.config.query_timeout);
                warn!(tenant = %self.tenant_id, request_id = %request_id, "{error}");
                QueryResult::failure(request, error.to_string())
            }
        }
    }

    /// Fail every asynchronous query older than its TTL. Returns how many
    /// expired.
    pub fn expire_pending(&self) -> usize {
        let expired = self.pending.remove_expired();
        let count = expired.len();
        for pending in expired {
            let request_id = pending.request().request_id.clone();
            self.reply.release(&request_id);
            let error = self.timeout_error(&request_id, pending.ttl());
            pending.fail(error.to_string());
        }
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.pending_count()
    }

    pub fn pending_stats(&self) -> &PendingStats {
        self.pending.stats()
    }

    /// Spawn [`cleanup_task`] for this executor on the current runtime.
    pub fn spawn_cleanup(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(cleanup_task(Arc::downgrade(self), self.config.cleanup_interval))
    }
}

impl Drop for QueryExecutor {
    fn drop(&mut self) {
        let abandoned = self.pending.drain();
        if abandoned.is_empty() {
            return;
        }
        debug!(
            executor = %self.executor_id,
            count = abandoned.len(),
            "Failing pending queries of dropped executor"
        );
        for pending in abandoned {
            self.reply.release(&pending.request().request_id);
            pending.fail("query executor dropped");
        }
    }
}

/// Background task expiring unanswered asynchronous queries.
///
/// Ends once the executor is dropped.
pub async fn cleanup_task(executor: Weak<QueryExecutor>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let Some(executor) = executor.upgrade() else {
            debug!("Query executor gone, stopping cleanup");
            break;
        };
        let expired = executor.expire_pending();
        if expired > 0 {
            debug!(expired, "Expired pending queries");
        }
    }
}
