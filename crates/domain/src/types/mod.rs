//! Domain types and models

pub mod auth;
pub mod network;
pub mod queue;
pub mod request;

pub use auth::{RefreshRequest, SessionEvent, TokenPair};
pub use network::{ConnectionType, ConnectivityState};
pub use queue::{EnqueueOptions, FlushReport, QueueItem, QueuePriority};
pub use request::{normalize_path, ApiResponse, Fingerprint, HttpMethod, RequestEnvelope};
