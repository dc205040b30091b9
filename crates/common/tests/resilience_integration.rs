//! Integration tests for the resilience module
//!
//! Exercises backoff math and the policy seam the way the HTTP layer uses
//! them: a policy classifies errors, the config turns attempts into delays.

use std::time::Duration;

use steadfast_common::resilience::{
    BackoffStrategy, Jitter, RetryConfig, RetryDecision, RetryPolicy,
};

#[derive(Debug)]
enum FakeError {
    Flaky,
    Fatal,
}

struct FlakyOnly {
    max_attempts: u32,
}

impl RetryPolicy<FakeError> for FlakyOnly {
    fn should_retry(&self, error: &FakeError, attempt: u32) -> RetryDecision {
        match error {
            FakeError::Flaky if attempt < self.max_attempts => RetryDecision::Retry,
            _ => RetryDecision::Stop,
        }
    }
}

fn exponential(jitter: Jitter) -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        backoff: BackoffStrategy::Exponential {
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
        },
        jitter,
        max_delay: Duration::from_secs(30),
    }
}

/// Validates that delays grow strictly across attempts even with the
/// maximum jitter sample on the earlier attempt and none on the later one.
#[test]
fn test_delays_strictly_increase_within_jitter_bounds() {
    let config = exponential(Jitter::Uniform { max: Duration::from_secs(1) });
    let just_under_second = Duration::from_millis(999);

    let first_worst = config.delay_with_jitter(1, just_under_second);
    let second_best = config.delay_with_jitter(2, Duration::ZERO);
    let third_best = config.delay_with_jitter(3, Duration::ZERO);

    assert!(first_worst < second_best);
    assert!(config.delay_with_jitter(2, just_under_second) < third_best);
}

#[test]
fn test_sampled_delays_stay_in_range() {
    let config = exponential(Jitter::Uniform { max: Duration::from_secs(1) });
    for attempt in 1..=3 {
        let base = Duration::from_secs(1 << (attempt - 1));
        for _ in 0..50 {
            let delay = config.delay_for(attempt);
            assert!(delay >= base, "attempt {attempt}: {delay:?} < {base:?}");
            assert!(delay < base + Duration::from_secs(1));
        }
    }
}

#[test]
fn test_max_delay_caps_large_attempts() {
    let config = exponential(Jitter::Uniform { max: Duration::from_secs(1) });
    assert_eq!(config.delay_for(10), Duration::from_secs(30));
}

#[test]
fn test_policy_stops_at_ceiling() {
    let policy = FlakyOnly { max_attempts: 3 };

    assert_eq!(policy.should_retry(&FakeError::Flaky, 1), RetryDecision::Retry);
    assert_eq!(policy.should_retry(&FakeError::Flaky, 2), RetryDecision::Retry);
    assert_eq!(policy.should_retry(&FakeError::Flaky, 3), RetryDecision::Stop);
    assert_eq!(policy.should_retry(&FakeError::Fatal, 1), RetryDecision::Stop);
    assert!(!RetryDecision::Stop.is_retry());
    assert!(RetryDecision::RetryAfter(Duration::from_secs(2)).is_retry());
}

#[test]
fn test_fixed_backoff_ignores_attempt() {
    let config = RetryConfig {
        backoff: BackoffStrategy::Fixed(Duration::from_millis(250)),
        jitter: Jitter::None,
        ..exponential(Jitter::None)
    };
    assert_eq!(config.delay_for(1), Duration::from_millis(250));
    assert_eq!(config.delay_for(3), Duration::from_millis(250));
}
