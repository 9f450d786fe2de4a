//! Bounded offline action queue.
//!
//! While no connectivity is detected, mutating actions are buffered here
//! and replayed once connectivity and authentication allow. The buffer is
//! a ring: once capacity is exceeded the oldest entries are dropped first.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use cartkit_core::{QueuedAction, SyncQueueEntry};

/// Bounded ring buffer of pending mutations.
#[derive(Debug, Clone)]
pub struct OfflineQueue {
    entries: VecDeque<SyncQueueEntry>,
    capacity: usize,
    max_retries: u32,
}

impl OfflineQueue {
    /// Create a queue holding at most `capacity` entries, each retried at
    /// most `max_retries` times before being discarded.
    #[must_use]
    pub fn new(capacity: usize, max_retries: u32) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            max_retries,
        }
    }

    /// Buffer an action, dropping the oldest entry at capacity.
    pub fn push(&mut self, action: QueuedAction) {
        if self.entries.len() >= self.capacity {
            if let Some(dropped) = self.entries.pop_front() {
                debug!(?dropped.action, "offline queue full, dropping oldest entry");
            }
        }
        self.entries.push_back(SyncQueueEntry::new(action, Utc::now()));
    }

    /// Take all entries for a replay attempt, leaving the queue empty.
    ///
    /// Callers push failed entries back via [`Self::requeue`].
    pub fn drain(&mut self) -> Vec<SyncQueueEntry> {
        self.entries.drain(..).collect()
    }

    /// Return a failed entry with its retry counter incremented, unless it
    /// has exhausted its retries, in which case it is discarded.
    ///
    /// Returns whether the entry was kept.
    pub fn requeue(&mut self, mut entry: SyncQueueEntry) -> bool {
        entry.retries += 1;
        if entry.retries > self.max_retries {
            debug!(?entry.action, retries = entry.retries, "dropping queued action after max retries");
            return false;
        }
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        true
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(product_id: &str) -> QueuedAction {
        QueuedAction::AddItem {
            product_id: product_id.into(),
            variation_id: None,
            quantity: 1,
            attributes: vec![],
            replace: false,
        }
    }

    #[test]
    fn test_capacity_bound_drops_oldest_first() {
        let mut queue = OfflineQueue::new(3, 3);
        for i in 0..5 {
            queue.push(add(&i.to_string()));
        }
        assert_eq!(queue.len(), 3);

        let entries = queue.drain();
        let first = &entries[0].action;
        assert_eq!(first, &add("2"));
    }

    #[test]
    fn test_requeue_increments_retries() {
        let mut queue = OfflineQueue::new(4, 2);
        queue.push(QueuedAction::Clear);
        let mut entries = queue.drain();
        let entry = entries.pop().expect("entry");
        assert!(queue.requeue(entry));
        assert_eq!(queue.drain()[0].retries, 1);
    }

    #[test]
    fn test_entry_discarded_after_max_retries() {
        let mut queue = OfflineQueue::new(4, 1);
        queue.push(QueuedAction::Clear);

        let entry = queue.drain().pop().expect("entry");
        let entry = {
            assert!(queue.requeue(entry)); // retries = 1
            queue.drain().pop().expect("entry")
        };
        assert!(!queue.requeue(entry)); // retries would be 2 > max 1
        assert!(queue.is_empty());
    }
}
