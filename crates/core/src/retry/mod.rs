//! Retry classification for HTTP calls

mod policy;

pub use policy::HttpRetryPolicy;
