use steadfast_common::cache::{Cache, CacheConfig, CacheStats};
use steadfast_common::resilience::{Clock, SystemClock};
use steadfast_domain::{ApiResponse, CacheSettings, Fingerprint, HttpMethod, RequestConfig};
use tracing::debug;

/// Time-bounded response cache keyed by request fingerprint
///
/// Only GET requests on non-authentication paths are eligible. Hits are
/// "fresh within TTL", not "fresh as of now"; callers always receive their
/// own copy of the cached response.
#[derive(Clone)]
pub struct RequestCache<C = SystemClock>
where
    C: Clock + Clone,
{
    entries: Cache<Fingerprint, ApiResponse, C>,
    requests: RequestConfig,
}

impl RequestCache<SystemClock> {
    pub fn new(settings: &CacheSettings, requests: &RequestConfig) -> Self {
        Self::with_clock(settings, requests, SystemClock)
    }
}

impl<C> RequestCache<C>
where
    C: Clock + Clone,
{
    pub fn with_clock(settings: &CacheSettings, requests: &RequestConfig, clock: C) -> Self {
        let config = CacheConfig::builder()
            .ttl(settings.ttl())
            .max_size(settings.max_entries)
            .track_metrics(true)
            .build();
        Self { entries: Cache::with_clock(config, clock), requests: requests.clone() }
    }

    /// Whether responses for `method` + `path` may be cached
    pub fn is_eligible(&self, method: HttpMethod, path: &str) -> bool {
        method == HttpMethod::Get && !self.requests.is_auth_path(path)
    }

    /// Cached response for `fingerprint`, if still within TTL
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<ApiResponse> {
        let hit = self.entries.get(fingerprint);
        debug!(fingerprint = %fingerprint.short(), hit = hit.is_some(), "cache lookup");
        hit
    }

    /// Remember a successful response
    pub fn store(&self, fingerprint: Fingerprint, response: ApiResponse) {
        if response.is_success() {
            self.entries.insert(fingerprint, response);
        }
    }

    /// Evict expired entries, returning how many were removed
    pub fn sweep(&self) -> usize {
        self.entries.cleanup_expired()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.entries.stats()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use steadfast_common::resilience::MockClock;

    use super::*;

    fn cache(clock: &MockClock) -> RequestCache<MockClock> {
        let settings = CacheSettings::default();
        RequestCache::with_clock(&settings, &RequestConfig::default(), clock.clone())
    }

    fn fingerprint(path: &str) -> Fingerprint {
        Fingerprint::compute(HttpMethod::Get, path, &BTreeMap::new(), None)
    }

    #[test]
    fn test_only_non_auth_gets_are_eligible() {
        let cache = cache(&MockClock::new());
        assert!(cache.is_eligible(HttpMethod::Get, "/classes"));
        assert!(!cache.is_eligible(HttpMethod::Get, "/auth/me"));
        assert!(!cache.is_eligible(HttpMethod::Put, "/classes/1"));
        assert!(!cache.is_eligible(HttpMethod::Post, "/classes"));
    }

    #[test]
    fn test_hit_within_ttl_and_miss_after() {
        let clock = MockClock::new();
        let cache = cache(&clock);
        let key = fingerprint("/classes");
        cache.store(key, ApiResponse::new(200, b"[1]".to_vec()));

        clock.advance_secs(299);
        assert_eq!(cache.lookup(&key).map(|r| r.body), Some(b"[1]".to_vec()));

        clock.advance_secs(1);
        assert!(cache.lookup(&key).is_none());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_error_responses_are_not_stored() {
        let cache = cache(&MockClock::new());
        cache.store(fingerprint("/missing"), ApiResponse::new(404, Vec::new()));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let settings = CacheSettings { max_entries: 2, ..CacheSettings::default() };
        let cache =
            RequestCache::with_clock(&settings, &RequestConfig::default(), MockClock::new());
        cache.store(fingerprint("/a"), ApiResponse::new(200, b"a".to_vec()));
        cache.store(fingerprint("/b"), ApiResponse::new(200, b"b".to_vec()));
        assert!(cache.lookup(&fingerprint("/a")).is_some());
        cache.store(fingerprint("/c"), ApiResponse::new(200, b"c".to_vec()));

        assert_eq!(cache.len(), 2);
        assert!(cache.lookup(&fingerprint("/b")).is_none());
        assert!(cache.lookup(&fingerprint("/a")).is_some());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_sweep_and_clear() {
        let clock = MockClock::new();
        let cache = cache(&clock);
        cache.store(fingerprint("/a"), ApiResponse::new(200, Vec::new()));
        clock.advance_secs(301);
        cache.store(fingerprint("/b"), ApiResponse::new(200, Vec::new()));

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
