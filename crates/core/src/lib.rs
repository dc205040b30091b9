//! # Steadfast Core
//!
//! Transport-independent resilience logic for the API client.
//!
//! This crate contains:
//! - Port interfaces for the client's collaborators (credential storage,
//!   token refresh, offline queue, connectivity signal)
//! - The request cache, in-flight deduplication registry and HTTP retry
//!   policy
//! - The single-flight token refresh coordinator
//!
//! ## Architecture Principles
//! - Only depends on `steadfast-common` and `steadfast-domain`
//! - No HTTP, filesystem or platform code
//! - All external effects go through traits

pub mod auth;
pub mod cache;
pub mod dedup;
pub mod network;
pub mod queue;
pub mod retry;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use auth::ports::{CredentialStore, RefreshFailure, TokenRefresher};
pub use auth::TokenRefreshCoordinator;
pub use cache::RequestCache;
pub use dedup::{DeduplicationRegistry, Joined, SharedResponse, Ticket};
pub use network::ports::NetworkMonitor;
pub use queue::ports::{OfflineQueue, QueueReplayer};
pub use queue::drain_queue;
pub use retry::HttpRetryPolicy;
