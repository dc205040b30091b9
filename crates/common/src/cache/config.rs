//! Cache configuration types

use std::time::Duration;

/// Eviction policy applied when the cache is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicy {
    /// Least Recently Used
    #[default]
    LRU,
    /// Frequency-aware admission: rarely used newcomers may be rejected
    TinyLfu,
    /// Inserts beyond `max_size` still succeed; nothing is evicted
    None,
}

/// Configuration for cache behavior
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (None = unlimited)
    pub max_size: Option<usize>,

    /// Time-to-live for entries (None = no expiration)
    pub ttl: Option<Duration>,

    /// Eviction policy when max_size is reached
    pub eviction_policy: EvictionPolicy,

    /// Whether to collect hit/miss statistics
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: None,
            ttl: None,
            eviction_policy: EvictionPolicy::LRU,
            track_metrics: false,
        }
    }
}

impl CacheConfig {
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// TTL-only cache, unbounded in size
    pub fn ttl(duration: Duration) -> Self {
        Self {
            max_size: None,
            ttl: Some(duration),
            eviction_policy: EvictionPolicy::None,
            track_metrics: false,
        }
    }

    /// Size-bounded LRU cache without expiry
    pub fn lru(max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ttl: None,
            eviction_policy: EvictionPolicy::LRU,
            track_metrics: false,
        }
    }

    /// Combined TTL + LRU cache
    pub fn ttl_lru(ttl: Duration, max_size: usize) -> Self {
        Self {
            max_size: Some(max_size),
            ttl: Some(ttl),
            eviction_policy: EvictionPolicy::LRU,
            track_metrics: false,
        }
    }
}

/// Builder for [`CacheConfig`]
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = Some(size);
        self
    }

    pub fn ttl(mut self, duration: Duration) -> Self {
        self.config.ttl = Some(duration);
        self
    }

    pub fn eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.config.eviction_policy = policy;
        self
    }

    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    pub fn build(self) -> CacheConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let ttl = CacheConfig::ttl(Duration::from_secs(60));
        assert_eq!(ttl.ttl, Some(Duration::from_secs(60)));
        assert_eq!(ttl.max_size, None);
        assert_eq!(ttl.eviction_policy, EvictionPolicy::None);

        let both = CacheConfig::ttl_lru(Duration::from_secs(300), 512);
        assert_eq!(both.max_size, Some(512));
        assert_eq!(both.eviction_policy, EvictionPolicy::LRU);
    }

    #[test]
    fn test_builder() {
        let config = CacheConfig::builder()
            .max_size(10)
            .ttl(Duration::from_secs(5))
            .eviction_policy(EvictionPolicy::TinyLfu)
            .track_metrics(true)
            .build();

        assert_eq!(config.max_size, Some(10));
        assert_eq!(config.ttl, Some(Duration::from_secs(5)));
        assert_eq!(config.eviction_policy, EvictionPolicy::TinyLfu);
        assert!(config.track_metrics);
    }
}
