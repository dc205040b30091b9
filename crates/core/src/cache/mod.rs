//! Response cache for safe, idempotent reads

mod request_cache;

pub use request_cache::RequestCache;
