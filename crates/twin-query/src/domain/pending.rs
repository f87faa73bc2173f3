//! Pending Query Store - callbacks of asynchronous queries awaiting a reply.
//!
//! Maps request ids to the callback that must receive the matching
//! `QueryResult`. Every registered callback is consumed exactly once: by
//! `complete`, by `cancel` (dropped) or by `remove_expired`.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use twin_types::{QueryRequest, QueryResult};

/// Callback receiving the result of an asynchronous query.
pub type QueryCallback = Box<dyn FnOnce(QueryResult) + Send + Sync>;

/// A query waiting for its reply.
pub struct PendingQuery {
    request: QueryRequest,
    callback: QueryCallback,
    created_at: Instant,
    ttl: Duration,
}

impl PendingQuery {
    pub fn request(&self) -> &QueryRequest {
        &self.request
    }

    /// Time the entry may wait for its reply.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time since registration.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Deliver a failed result to the callback.
    pub fn fail(self, error_message: impl Into<String>) {
        let result = QueryResult::failure(self.request, error_message);
        (self.callback)(result);
    }
}

/// Statistics for pending query store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total callbacks registered
    pub total_registered: AtomicU64,
    /// Total callbacks completed with a reply
    pub total_completed: AtomicU64,
    /// Total callbacks expired without a reply
    pub total_timeouts: AtomicU64,
    /// Total callbacks cancelled
    pub total_cancelled: AtomicU64,
}

/// Pending query store for asynchronous queries.
///
/// Flow:
/// 1. Executor calls `register()` with the request and its callback
/// 2. Executor publishes the request
/// 3. Reply listener receives the result and calls `complete()`
/// 4. Unanswered entries are swept by `remove_expired()`
pub struct PendingQueryStore {
    pending: DashMap<String, PendingQuery>,
    default_ttl: Duration,
    stats: Arc<PendingStats>,
}

impl PendingQueryStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            pending: DashMap::new(),
            default_ttl,
            stats: Arc::new(PendingStats::default()),
        }
    }

    /// Register a callback for `request`.
    ///
    /// A previous entry under the same request id is replaced and counted as
    /// cancelled.
    pub fn register(&self, request: QueryRequest, ttl: Option<Duration>, callback: QueryCallback) {
        let request_id = request.request_id.clone();
        let entry = PendingQuery {
            request,
            callback,
            created_at: Instant::now(),
            ttl: ttl.unwrap_or(self.default_ttl),
        };

        if self.pending.insert(request_id.clone(), entry).is_some() {
            warn!(request_id = %request_id, "Replaced pending query with the same id");
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
        }
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(request_id = %request_id, "Registered pending query");
    }

    /// Hand `result` to the callback registered for its request id.
    ///
    /// Returns false if no callback was pending. The callback runs on the
    /// calling thread after the entry has been removed.
    pub fn complete(&self, result: QueryResult) -> bool {
        let Some((request_id, pending)) = self.pending.remove(result.request_id()) else {
            warn!(
                request_id = %result.request_id(),
                "Result for unknown or expired query"
            );
            return false;
        };

        self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            request_id = %request_id,
            response_time_ms = pending.created_at.elapsed().as_millis(),
            "Completed pending query"
        );
        (pending.callback)(result);
        true
    }

    /// Remove entries older than their TTL and return them.
    pub fn remove_expired(&self) -> Vec<PendingQuery> {
        let now = Instant::now();
        let expired_ids: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| now.duration_since(entry.created_at) > entry.ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            // Re-check: the reply may have raced the sweep.
            if let Some((_, pending)) = self
                .pending
                .remove_if(&id, |_, p| now.duration_since(p.created_at) > p.ttl)
            {
                warn!(
                    request_id = %id,
                    elapsed_ms = pending.age().as_millis(),
                    ttl_ms = pending.ttl.as_millis(),
                    "Removing expired pending query"
                );
                self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
                expired.push(pending);
            }
        }
        expired
    }

    /// Drop the callback of `request_id` without calling it.
    pub fn cancel(&self, request_id: &str) -> bool {
        if self.pending.remove(request_id).is_some() {
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Remove the entry of `request_id` and hand it back uncalled.
    pub fn take(&self, request_id: &str) -> Option<PendingQuery> {
        self.pending.remove(request_id).map(|(_, pending)| pending)
    }

    /// Remove every entry.
    pub fn drain(&self) -> Vec<PendingQuery> {
        let ids: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        ids.iter().filter_map(|id| self.take(id)).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}
