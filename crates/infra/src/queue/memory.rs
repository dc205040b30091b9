use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use steadfast_core::OfflineQueue;
use steadfast_domain::constants::DEFAULT_QUEUE_MAX_RETRIES;
use steadfast_domain::{ApiResult, EnqueueOptions, HttpMethod, QueueItem};
use tracing::debug;

use super::state::QueueState;

/// Offline queue that lives only as long as the process
#[derive(Debug)]
pub struct InMemoryOfflineQueue {
    state: Mutex<QueueState>,
    default_max_retries: u32,
}

impl Default for InMemoryOfflineQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_MAX_RETRIES)
    }
}

impl InMemoryOfflineQueue {
    pub fn new(default_max_retries: u32) -> Self {
        Self { state: Mutex::new(QueueState::default()), default_max_retries }
    }
}

#[async_trait]
impl OfflineQueue for InMemoryOfflineQueue {
    async fn enqueue(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
        options: EnqueueOptions,
    ) -> ApiResult<String> {
        let item = self.state.lock().push(path, method, body, options, self.default_max_retries);
        debug!(id = %item.id, %method, path, priority = %item.priority, "queued offline request");
        Ok(item.id)
    }

    async fn pending(&self) -> ApiResult<Vec<QueueItem>> {
        Ok(self.state.lock().items().to_vec())
    }

    async fn remove(&self, id: &str) -> ApiResult<bool> {
        Ok(self.state.lock().remove(id))
    }

    async fn record_failure(&self, id: &str) -> ApiResult<Option<QueueItem>> {
        Ok(self.state.lock().record_failure(id))
    }

    async fn len(&self) -> ApiResult<usize> {
        Ok(self.state.lock().len())
    }
}
