use serde::{Deserialize, Serialize};
use serde_json::Value;
use steadfast_domain::{EnqueueOptions, HttpMethod, QueueItem};

/// Queue contents plus the sequence counter, persisted together
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct QueueState {
    next_sequence: u64,
    items: Vec<QueueItem>,
}

impl QueueState {
    pub(crate) fn push(
        &mut self,
        path: &str,
        method: HttpMethod,
        body: Option<Value>,
        options: EnqueueOptions,
        default_max_retries: u32,
    ) -> QueueItem {
        let item =
            QueueItem::new(path, method, body, options, default_max_retries, self.next_sequence);
        self.next_sequence += 1;
        let position = self.items.partition_point(|queued| queued.drain_key() <= item.drain_key());
        self.items.insert(position, item.clone());
        item
    }

    pub(crate) fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub(crate) fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub(crate) fn record_failure(&mut self, id: &str) -> Option<QueueItem> {
        self.items.iter_mut().find(|item| item.id == id).map(|item| {
            item.retry_count += 1;
            item.clone()
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Restore drain order and the sequence counter after loading
    pub(crate) fn normalize(&mut self) {
        self.items.sort_by_key(QueueItem::drain_key);
        let max_seen = self.items.iter().map(|item| item.sequence + 1).max().unwrap_or(0);
        self.next_sequence = self.next_sequence.max(max_seen);
    }
}
