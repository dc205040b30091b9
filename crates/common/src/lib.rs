//! Modular common utilities shared across Steadfast crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: clock abstraction, backoff strategies and jitter
//! - `runtime`: thread-safe TTL cache with statistics (adds tracing)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod resilience;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "runtime")]
pub use cache::{Cache, CacheConfig, CacheStats, EvictionPolicy};
#[cfg(feature = "foundation")]
pub use resilience::{
    BackoffStrategy, Clock, Jitter, MockClock, RetryConfig, RetryDecision, RetryPolicy,
    SystemClock,
};
