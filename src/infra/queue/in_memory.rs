// In-memory implementation of MediaStore.
//
// Insertion order falls out of the backing Vec, which is exactly the order
// `list` must report. Not durable, obviously - it exists so the core service
// logic can be tested without a database, following the same contract as the
// SQLite store.

use crate::core::queue::{ItemStatus, MediaStore, PendingItem, QueueError, QueueStats};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

pub struct InMemoryMediaStore {
    items: Mutex<Vec<PendingItem>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// A poisoned mutex only means another test thread panicked mid-write;
    /// the Vec itself is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<PendingItem>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for InMemoryMediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaStore for InMemoryMediaStore {
    async fn insert(&self, item: &PendingItem) -> Result<(), QueueError> {
        let mut items = self.lock();
        if items.iter().any(|existing| existing.id == item.id) {
            return Err(QueueError::Storage(format!(
                "duplicate item id {}",
                item.id
            )));
        }
        items.push(item.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PendingItem>, QueueError> {
        Ok(self.lock().iter().find(|item| item.id == id).cloned())
    }

    async fn try_decide(
        &self,
        id: &str,
        status: ItemStatus,
        decided_by: u64,
        decided_at: DateTime<Utc>,
    ) -> Result<PendingItem, QueueError> {
        let mut items = self.lock();
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        if item.status.is_terminal() {
            return Err(QueueError::AlreadyDecided(id.to_string()));
        }

        item.status = status;
        item.decided_by = Some(decided_by);
        item.decided_at = Some(decided_at);
        Ok(item.clone())
    }

    async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<PendingItem>, QueueError> {
        Ok(self
            .lock()
            .iter()
            .filter(|item| status.map_or(true, |s| item.status == s))
            .cloned()
            .collect())
    }

    async fn count_pending(&self) -> Result<u64, QueueError> {
        Ok(self
            .lock()
            .iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .count() as u64)
    }

    async fn count_pending_for(&self, submitter_id: u64) -> Result<u64, QueueError> {
        Ok(self
            .lock()
            .iter()
            .filter(|item| item.status == ItemStatus::Pending && item.submitter_id == submitter_id)
            .count() as u64)
    }

    async fn delete_terminal(&self, id: &str) -> Result<bool, QueueError> {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|item| !(item.id == id && item.status.is_terminal()));
        Ok(items.len() < before)
    }

    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        let mut items = self.lock();
        let before = items.len();
        items.retain(|item| {
            !(item.status.is_terminal() && item.decided_at.map_or(false, |at| at < cutoff))
        });
        Ok((before - items.len()) as u64)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let items = self.lock();
        let mut stats = QueueStats {
            total: items.len() as u64,
            ..Default::default()
        };

        for item in items.iter() {
            match item.status {
                ItemStatus::Pending => stats.pending += 1,
                ItemStatus::Approved => stats.approved += 1,
                ItemStatus::Rejected => stats.rejected += 1,
            }

            match stats.by_kind.iter_mut().find(|(kind, _)| *kind == item.media_kind) {
                Some((_, count)) => *count += 1,
                None => stats.by_kind.push((item.media_kind, 1)),
            }

            if item.status == ItemStatus::Pending {
                stats.oldest_pending = match stats.oldest_pending {
                    Some(oldest) if oldest <= item.submitted_at => Some(oldest),
                    _ => Some(item.submitted_at),
                };
            }
        }

        Ok(stats)
    }
}
