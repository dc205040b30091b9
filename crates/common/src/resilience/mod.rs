//! Resilience primitives for fault tolerance
//!
//! This module provides **generic, reusable** building blocks:
//! - **Clock**: monotonic time abstraction so TTL and backoff logic can be
//!   driven deterministically in tests (`MockClock`)
//! - **Backoff**: exponential/fixed delay strategies with uniform jitter
//! - **Retry policy seam**: the `RetryPolicy` trait and `RetryDecision` that
//!   domain-specific policies implement
//!
//! Domain classification (which HTTP failures are retryable) lives with the
//! caller; this module only knows about attempts and delays.

pub mod clock;
pub mod retry;

pub use clock::{Clock, MockClock, SystemClock};
pub use retry::{BackoffStrategy, Jitter, RetryConfig, RetryConfigError, RetryDecision, RetryPolicy};
