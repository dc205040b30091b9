//! Offline queue types

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::request::HttpMethod;

/// Replay tier; `High` drains before `Normal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    High = 0,
    Normal = 1,
}

impl Default for QueuePriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for QueuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Normal => write!(f, "normal"),
        }
    }
}

/// Options accepted by `OfflineQueue::enqueue`
#[derive(Debug, Clone, Default)]
pub struct EnqueueOptions {
    pub priority: QueuePriority,
    pub headers: BTreeMap<String, String>,
    /// Falls back to the queue's configured default
    pub max_retries: Option<u32>,
}

/// A write request captured while offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub priority: QueuePriority,
    pub headers: BTreeMap<String, String>,
    pub max_retries: u32,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    /// Monotonic insertion order, breaks ties within a priority tier
    pub sequence: u64,
}

impl QueueItem {
    pub fn new(
        path: impl Into<String>,
        method: HttpMethod,
        body: Option<Value>,
        options: EnqueueOptions,
        default_max_retries: u32,
        sequence: u64,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            path: path.into(),
            method,
            body,
            priority: options.priority,
            headers: options.headers,
            max_retries: options.max_retries.unwrap_or(default_max_retries),
            retry_count: 0,
            created_at: Utc::now(),
            sequence,
        }
    }

    /// Drain order: priority tier, then creation order
    pub fn drain_key(&self) -> (QueuePriority, u64) {
        (self.priority, self.sequence)
    }

    /// Whether the item has replay budget left
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Outcome of one offline queue flush
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub replayed: usize,
    pub dropped: usize,
    pub remaining: usize,
    /// Set when a transient failure interrupted the drain
    pub stopped_early: bool,
}
