//! Port interfaces for the offline write queue

use async_trait::async_trait;
use serde_json::Value;
use steadfast_domain::{ApiResponse, ApiResult, EnqueueOptions, HttpMethod, QueueItem};

/// Durable store for write requests issued while disconnected
#[async_trait]
pub trait OfflineQueue: Send + Sync {
    /// Capture a request, returning its queue id
    async fn enqueue(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
        options: EnqueueOptions,
    ) -> ApiResult<String>;

    /// Queued items in drain order: high priority first, then creation order
    async fn pending(&self) -> ApiResult<Vec<QueueItem>>;

    /// Remove an item; `false` when it was not queued
    async fn remove(&self, id: &str) -> ApiResult<bool>;

    /// Count one failed replay, returning the updated item
    async fn record_failure(&self, id: &str) -> ApiResult<Option<QueueItem>>;

    async fn len(&self) -> ApiResult<usize>;

    async fn is_empty(&self) -> ApiResult<bool> {
        Ok(self.len().await? == 0)
    }
}

/// Sends a queued item to the backend
#[async_trait]
pub trait QueueReplayer: Send + Sync {
    async fn replay(&self, item: &QueueItem) -> ApiResult<ApiResponse>;
}
