//! # Steadfast Infrastructure
//!
//! Infrastructure implementations of the core ports and the request
//! pipeline that ties them together.
//!
//! This crate contains:
//! - The request pipeline and endpoint failover (`api`)
//! - The single-attempt HTTP client (`http`)
//! - Credential stores (keychain, in-memory)
//! - Offline queues (in-memory, JSON file)
//! - The connectivity monitor
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `steadfast-core`
//! - Contains all "impure" code (network, keychain, filesystem)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod network;
pub mod observability;
pub mod queue;
pub mod storage;

// Re-export commonly used items
pub use api::{EndpointResolver, HttpTokenRefresher, RequestPipeline, RequestPipelineBuilder, Stage};
pub use http::{HttpClient, HttpClientBuilder};
pub use network::WatchNetworkMonitor;
pub use observability::{init_tracing, ClientMetrics, ClientMetricsSnapshot, LogFormat};
pub use queue::{FileOfflineQueue, InMemoryOfflineQueue};
pub use storage::{KeychainCredentialStore, MemoryCredentialStore};
