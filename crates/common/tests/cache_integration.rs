//! Integration tests for the TTL cache
//!
//! Concurrency and expiry behavior across clones and threads.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use steadfast_common::cache::{Cache, CacheConfig};
use steadfast_common::resilience::MockClock;

#[test]
fn test_concurrent_writers_and_readers() {
    let cache: Arc<Cache<u32, String>> = Arc::new(Cache::new(CacheConfig::lru(1_000)));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = worker * 100 + i;
                    cache.insert(key, format!("value-{key}"));
                    assert_eq!(cache.get(&key), Some(format!("value-{key}")));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked");
    }

    assert_eq!(cache.len(), 800);
}

#[test]
fn test_bounded_cache_never_exceeds_capacity() {
    let cache: Cache<u32, u32> = Cache::new(CacheConfig::lru(16));
    for i in 0..100 {
        cache.insert(i, i);
        assert!(cache.len() <= 16);
    }
    // most recent entries survive
    assert_eq!(cache.get(&99), Some(99));
    assert_eq!(cache.get(&0), None);
}

#[test]
fn test_sweep_bounds_memory_with_mock_time() {
    let clock = MockClock::new();
    let config = CacheConfig::builder().ttl(Duration::from_secs(300)).track_metrics(true).build();
    let cache: Cache<u32, Vec<u8>, MockClock> = Cache::with_clock(config, clock.clone());

    for i in 0..50 {
        cache.insert(i, vec![0; 64]);
    }
    clock.advance_secs(301);
    for i in 50..60 {
        cache.insert(i, vec![1; 64]);
    }

    assert_eq!(cache.cleanup_expired(), 50);
    assert_eq!(cache.len(), 10);
    assert_eq!(cache.stats().expirations, 50);
}
