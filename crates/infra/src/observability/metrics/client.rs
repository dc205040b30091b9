//! Lock-free counters for the request pipeline
//!
//! Independent counters with `Relaxed` ordering; a snapshot is not a
//! consistent cut across counters, only per counter.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the request pipeline
#[derive(Debug, Default)]
pub struct ClientMetrics {
    dispatches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    dedup_joins: AtomicU64,
    retries: AtomicU64,
    refreshes: AtomicU64,
    failovers: AtomicU64,
    offline_enqueues: AtomicU64,
    replayed: AtomicU64,
    dropped: AtomicU64,
}

/// Plain copy of [`ClientMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClientMetricsSnapshot {
    /// Requests that reached the network (retries included)
    pub dispatches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Callers attached to an identical in-flight request
    pub dedup_joins: u64,
    pub retries: u64,
    /// 401s routed to the refresh coordinator
    pub refreshes: u64,
    pub failovers: u64,
    pub offline_enqueues: u64,
    pub replayed: u64,
    pub dropped: u64,
}

impl ClientMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dedup_join(&self) {
        self.dedup_joins.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failover(&self) {
        self.failovers.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_offline_enqueue(&self) {
        self.offline_enqueues.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, replayed: usize, dropped: usize) {
        self.replayed.fetch_add(replayed as u64, Ordering::Relaxed);
        self.dropped.fetch_add(dropped as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ClientMetricsSnapshot {
        ClientMetricsSnapshot {
            dispatches: self.dispatches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            dedup_joins: self.dedup_joins.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            failovers: self.failovers.load(Ordering::Relaxed),
            offline_enqueues: self.offline_enqueues.load(Ordering::Relaxed),
            replayed: self.replayed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}
