//! Core cache implementation

use std::hash::Hash;
use std::time::Instant;

use moka::notification::RemovalCause;
use moka::policy::EvictionPolicy as MokaPolicy;
use tracing::debug;

use super::config::{CacheConfig, EvictionPolicy};
use super::stats::{CacheStats, MetricsCollector};
use crate::resilience::{Clock, SystemClock};

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

/// Generic thread-safe cache with TTL expiry and bounded eviction
///
/// Storage and eviction are delegated to `moka`; expiry is judged against
/// the cache's own [`Clock`] so tests can drive it. Values are cloned out on
/// every hit, so callers never share a reference with the cache.
///
/// # Type Parameters
/// - `K`: Key type (must be `Eq + Hash + Clone`)
/// - `V`: Value type (must be `Clone`)
/// - `C`: Clock used for expiry (defaults to `SystemClock`)
pub struct Cache<K, V, C = SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock,
{
    store: moka::sync::Cache<K, CacheEntry<V>>,
    config: CacheConfig,
    metrics: MetricsCollector,
    clock: C,
}

impl<K, V> Cache<K, V, SystemClock>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache driven by the system clock
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<K, V, C> Cache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    /// Create a cache driven by a custom clock
    pub fn with_clock(config: CacheConfig, clock: C) -> Self {
        let metrics = MetricsCollector::default();
        let mut builder = moka::sync::Cache::builder();

        if let Some(max_size) = config.max_size {
            let policy = match config.eviction_policy {
                EvictionPolicy::LRU => Some(MokaPolicy::lru()),
                EvictionPolicy::TinyLfu => Some(MokaPolicy::tiny_lfu()),
                EvictionPolicy::None => None,
            };
            if let Some(policy) = policy {
                builder = builder
                    .max_capacity(u64::try_from(max_size).unwrap_or(u64::MAX))
                    .eviction_policy(policy);
            }
        }

        if config.track_metrics {
            let evictions = metrics.clone();
            builder = builder.eviction_listener(move |_key, _entry, cause| {
                if matches!(cause, RemovalCause::Size) {
                    evictions.record_eviction();
                }
            });
        }

        Self { store: builder.build(), config, metrics, clock }
    }

    /// Configuration the cache was built with
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Insert a value, replacing any previous entry for `key`
    ///
    /// A replaced entry gets a fresh timestamp. When the cache is full, an
    /// entry is evicted according to the eviction policy before this returns.
    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.store.insert(key, CacheEntry { value, inserted_at: now });
        if self.is_bounded() {
            self.store.run_pending_tasks();
        }

        if self.config.track_metrics {
            self.metrics.record_insert();
        }
    }

    /// Get a copy of the value for `key`
    ///
    /// Returns `None` when the key is absent or its entry has expired; an
    /// expired entry is removed on the way out.
    pub fn get(&self, key: &K) -> Option<V> {
        let Some(entry) = self.store.get(key) else {
            self.record_miss();
            return None;
        };

        if self.is_expired(&entry, self.clock.now()) {
            self.store.invalidate(key);
            self.record_miss();
            if self.config.track_metrics {
                self.metrics.record_expirations(1);
            }
            return None;
        }

        if self.config.track_metrics {
            self.metrics.record_hit();
        }
        Some(entry.value)
    }

    /// Whether a live (non-expired) entry exists
    ///
    /// Counts as an access for eviction order; hit/miss statistics are untouched.
    pub fn contains_key(&self, key: &K) -> bool {
        let now = self.clock.now();
        self.store.get(key).is_some_and(|entry| !self.is_expired(&entry, now))
    }

    /// Remove `key`, returning its value if present
    pub fn remove(&self, key: &K) -> Option<V> {
        self.store.remove(key).map(|entry| entry.value)
    }

    /// Remove every entry; statistics are kept
    pub fn clear(&self) {
        self.store.invalidate_all();
        self.store.run_pending_tasks();
    }

    /// Number of stored entries, expired ones included until swept
    pub fn len(&self) -> usize {
        self.store.run_pending_tasks();
        usize::try_from(self.store.entry_count()).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove expired entries, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        if self.config.ttl.is_none() {
            return 0;
        }

        let now = self.clock.now();
        let expired: Vec<_> = self
            .store
            .iter()
            .filter(|(_, entry)| self.is_expired(entry, now))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.store.invalidate(key.as_ref());
        }

        let removed = expired.len();
        if removed > 0 {
            self.store.run_pending_tasks();
            debug!(removed, remaining = self.store.entry_count(), "expired cache entries removed");
            if self.config.track_metrics {
                self.metrics.record_expirations(removed as u64);
            }
        }
        removed
    }

    /// Snapshot of the counters and current size
    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot(self.len(), self.config.max_size)
    }

    fn is_bounded(&self) -> bool {
        self.config.max_size.is_some() && self.config.eviction_policy != EvictionPolicy::None
    }

    fn is_expired(&self, entry: &CacheEntry<V>, now: Instant) -> bool {
        self.config.ttl.is_some_and(|ttl| now.saturating_duration_since(entry.inserted_at) >= ttl)
    }

    fn record_miss(&self) {
        if self.config.track_metrics {
            self.metrics.record_miss();
        }
    }
}

impl<K, V, C> Clone for Cache<K, V, C>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Clock + Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            clock: self.clock.clone(),
        }
    }
}
