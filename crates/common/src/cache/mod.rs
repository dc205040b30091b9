//! Generic TTL cache with optional size bound
//!
//! - **Thread-safe**: storage backed by `moka::sync::Cache`, cheap `Clone`
//! - **TTL**: entries older than the configured time-to-live are never served
//! - **Bounded**: LRU or TinyLFU eviction once `max_size` is reached
//! - **Testable**: a [`Clock`](crate::resilience::Clock) drives expiry
//!
//! ```
//! use std::time::Duration;
//!
//! use steadfast_common::cache::{Cache, CacheConfig};
//!
//! let cache: Cache<String, Vec<u8>> =
//!     Cache::new(CacheConfig::ttl_lru(Duration::from_secs(300), 512));
//! cache.insert("users".to_string(), b"[]".to_vec());
//! assert_eq!(cache.get(&"users".to_string()), Some(b"[]".to_vec()));
//! ```

pub mod config;
pub mod core;
pub mod stats;

pub use self::config::{CacheConfig, CacheConfigBuilder, EvictionPolicy};
pub use self::core::Cache;
pub use self::stats::CacheStats;
