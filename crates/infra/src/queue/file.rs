use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use steadfast_core::OfflineQueue;
use steadfast_domain::{ApiError, ApiResult, EnqueueOptions, HttpMethod, QueueItem};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::state::QueueState;

/// Offline queue persisted as a JSON snapshot
///
/// Every mutation rewrites the snapshot through a temporary file and an
/// atomic rename, so a crash leaves either the old or the new contents.
#[derive(Debug)]
pub struct FileOfflineQueue {
    path: PathBuf,
    state: Mutex<QueueState>,
    default_max_retries: u32,
}

impl FileOfflineQueue {
    /// Open the queue at `path`, loading any snapshot already there
    ///
    /// # Errors
    /// `ApiError::Storage` when an existing snapshot cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>, default_max_retries: u32) -> ApiResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut state: QueueState = serde_json::from_slice(&bytes).map_err(|e| {
                    ApiError::Storage(format!("corrupt queue file {}: {e}", path.display()))
                })?;
                state.normalize();
                info!(path = %path.display(), items = state.len(), "loaded offline queue");
                state
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => QueueState::default(),
            Err(err) => {
                return Err(ApiError::Storage(format!(
                    "failed to read queue file {}: {err}",
                    path.display()
                )))
            }
        };

        Ok(Self { path, state: Mutex::new(state), default_max_retries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &QueueState) -> ApiResult<()> {
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| ApiError::Storage(format!("failed to encode queue: {e}")))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(storage_error)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes).await.map_err(storage_error)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(storage_error)?;
        debug!(path = %self.path.display(), items = state.len(), "persisted offline queue");
        Ok(())
    }
}

fn storage_error(err: std::io::Error) -> ApiError {
    ApiError::Storage(format!("queue persistence failed: {err}"))
}

#[async_trait]
impl OfflineQueue for FileOfflineQueue {
    async fn enqueue(
        &self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
        options: EnqueueOptions,
    ) -> ApiResult<String> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let item = next.push(path, method, body, options, self.default_max_retries);
        self.persist(&next).await?;
        *state = next;
        debug!(id = %item.id, %method, path, priority = %item.priority, "queued offline request");
        Ok(item.id)
    }

    async fn pending(&self) -> ApiResult<Vec<QueueItem>> {
        Ok(self.state.lock().await.items().to_vec())
    }

    async fn remove(&self, id: &str) -> ApiResult<bool> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        if !next.remove(id) {
            return Ok(false);
        }
        self.persist(&next).await?;
        *state = next;
        Ok(true)
    }

    async fn record_failure(&self, id: &str) -> ApiResult<Option<QueueItem>> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        let Some(item) = next.record_failure(id) else {
            return Ok(None);
        };
        self.persist(&next).await?;
        *state = next;
        Ok(Some(item))
    }

    async fn len(&self) -> ApiResult<usize> {
        Ok(self.state.lock().await.len())
    }
}
