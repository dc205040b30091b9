//! Resilient API client
//!
//! [`RequestPipeline`] is the entry point. It composes the endpoint resolver,
//! the response cache, in-flight deduplication, the live retry policy, the
//! token refresh coordinator and the offline queue.

pub mod endpoint;
pub mod pipeline;
pub mod refresher;
pub mod stage;

pub use endpoint::{endpoint_url, EndpointResolver, EndpointSelection};
pub use pipeline::{RequestPipeline, RequestPipelineBuilder};
pub use refresher::HttpTokenRefresher;
pub use stage::Stage;
