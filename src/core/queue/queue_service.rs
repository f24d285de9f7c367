// Moderation queue service - core business logic for the media approval
// workflow.
//
// Responsibilities:
// - Bounded enqueue (capacity check and insert under one lock)
// - At-most-once decisions (approve/reject exactly once per item)
// - Bulk decisions with per-id results
// - Insertion-ordered listing and terminal-only purge
//
// NO transport dependencies here - just pure domain logic over a storage
// port.

use super::queue_models::{
    Decision, DecisionEvent, ItemStatus, NewSubmission, PendingItem, QueueStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("moderation queue is full ({capacity} items pending)")]
    Full { capacity: usize },

    #[error("no queued item with id {0}")]
    NotFound(String),

    #[error("item {0} already has a decision")]
    AlreadyDecided(String),

    #[error("storage error: {0}")]
    Storage(String),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Durable storage for pending media items.
///
/// Implementations must make every successful write visible after a process
/// restart before returning (durability before acknowledgment).
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist a new item. The id must not already exist.
    async fn insert(&self, item: &PendingItem) -> Result<(), QueueError>;

    /// Fetch one item by id.
    async fn get(&self, id: &str) -> Result<Option<PendingItem>, QueueError>;

    /// Atomically record a decision iff the item is still pending.
    ///
    /// Exactly one of two concurrent calls for the same id may succeed; the
    /// other must observe `AlreadyDecided`. Unknown ids yield `NotFound`.
    async fn try_decide(
        &self,
        id: &str,
        status: ItemStatus,
        decided_by: u64,
        decided_at: DateTime<Utc>,
    ) -> Result<PendingItem, QueueError>;

    /// Items in insertion order, optionally filtered by status. The returned
    /// sequence is a snapshot; later mutations do not change it.
    async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<PendingItem>, QueueError>;

    async fn count_pending(&self) -> Result<u64, QueueError>;

    async fn count_pending_for(&self, submitter_id: u64) -> Result<u64, QueueError>;

    /// Delete a terminal item. Returns false when the id is unknown or the
    /// item is still pending (pending items are never deleted through here).
    async fn delete_terminal(&self, id: &str) -> Result<bool, QueueError>;

    /// Delete all terminal items decided before the cutoff. Returns how many
    /// rows went away.
    async fn delete_terminal_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The moderation queue: a bounded, durable collection of media submissions
/// awaiting an admin decision.
pub struct ModerationQueue<S: MediaStore> {
    store: S,
    capacity: usize,
    /// Closes the check-then-act race between the pending count read and the
    /// insert. Decisions don't need it; they serialize in the store.
    enqueue_lock: tokio::sync::Mutex<()>,
    events: mpsc::UnboundedSender<DecisionEvent>,
}

impl<S: MediaStore> ModerationQueue<S> {
    /// Create the queue and the receiving end of its decision-event channel.
    /// The notification collaborator consumes the receiver.
    pub fn new(store: S, capacity: usize) -> (Self, mpsc::UnboundedReceiver<DecisionEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        (
            Self {
                store,
                capacity,
                enqueue_lock: tokio::sync::Mutex::new(()),
                events,
            },
            receiver,
        )
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Accept a new media submission.
    ///
    /// Fails with `QueueError::Full` when the pending count is at capacity -
    /// submissions are refused, never silently dropped. On success the item
    /// has been durably persisted before the id is returned.
    ///
    /// Retry safety: when the submission carries an idempotency token, the
    /// token is the id. A retried enqueue after an ambiguous failure finds
    /// the existing item and returns the same id without consuming capacity.
    pub async fn enqueue(&self, submission: NewSubmission) -> Result<String, QueueError> {
        let _guard = self.enqueue_lock.lock().await;

        let id = match &submission.idempotency_token {
            Some(token) => {
                if let Some(existing) = self.store.get(token).await? {
                    tracing::debug!(id = %existing.id, "enqueue retry matched existing item");
                    return Ok(existing.id);
                }
                token.clone()
            }
            None => Uuid::new_v4().to_string(),
        };

        let pending = self.store.count_pending().await?;
        if pending >= self.capacity as u64 {
            return Err(QueueError::Full {
                capacity: self.capacity,
            });
        }

        let item = PendingItem {
            id,
            submitter_id: submission.submitter_id,
            media_ref: submission.media_ref,
            media_kind: submission.media_kind,
            caption: submission.caption,
            submitted_at: Utc::now(),
            status: ItemStatus::Pending,
            decided_by: None,
            decided_at: None,
        };
        self.store.insert(&item).await?;

        tracing::info!(
            id = %item.id,
            submitter_id = item.submitter_id,
            kind = %item.media_kind,
            "media queued for moderation"
        );
        Ok(item.id)
    }

    /// Record an admin decision. Transitions the item's status exactly once:
    /// a second decision for the same id observes `AlreadyDecided` no matter
    /// how the two calls interleave.
    pub async fn decide(
        &self,
        id: &str,
        decision: Decision,
        decided_by: u64,
    ) -> Result<PendingItem, QueueError> {
        let status = decision.terminal_status();
        let item = self
            .store
            .try_decide(id, status, decided_by, Utc::now())
            .await?;

        tracing::info!(id = %item.id, status = %item.status, decided_by, "moderation decision recorded");

        // Best-effort: the decision is already durable; a gone notifier must
        // not fail it.
        let _ = self.events.send(DecisionEvent {
            item_id: item.id.clone(),
            submitter_id: item.submitter_id,
            status: item.status,
            decided_by,
        });

        Ok(item)
    }

    /// Apply one decision to many ids independently. Partial failure is
    /// expected: every id gets its own result and the batch never aborts.
    pub async fn bulk_decide(
        &self,
        ids: &[String],
        decision: Decision,
        decided_by: u64,
    ) -> Vec<(String, Result<PendingItem, QueueError>)> {
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.decide(id, decision, decided_by).await;
            results.push((id.clone(), result));
        }
        results
    }

    /// Snapshot of items in insertion order, optionally filtered by status.
    pub async fn list(&self, status: Option<ItemStatus>) -> Result<Vec<PendingItem>, QueueError> {
        self.store.list(status).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<PendingItem>, QueueError> {
        self.store.get(id).await
    }

    pub async fn pending_count_for(&self, submitter_id: u64) -> Result<u64, QueueError> {
        self.store.count_pending_for(submitter_id).await
    }

    /// Remove a decided item from durable storage. A no-op for unknown ids
    /// and for items that are still pending - undecided work is never lost
    /// through purge.
    pub async fn purge(&self, id: &str) -> Result<(), QueueError> {
        if self.store.delete_terminal(id).await? {
            tracing::debug!(id, "purged decided item");
        }
        Ok(())
    }

    /// Sweep terminal items whose decision is older than the cutoff.
    pub async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        let purged = self.store.delete_terminal_older_than(cutoff).await?;
        if purged > 0 {
            tracing::info!(purged, "swept old decided items");
        }
        Ok(purged)
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.store.stats().await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::queue::MediaKind;
    use crate::infra::queue::InMemoryMediaStore;
    use std::sync::Arc;

    fn queue_with_capacity(
        capacity: usize,
    ) -> (
        ModerationQueue<InMemoryMediaStore>,
        mpsc::UnboundedReceiver<DecisionEvent>,
    ) {
        ModerationQueue::new(InMemoryMediaStore::new(), capacity)
    }

    fn submission(submitter_id: u64) -> NewSubmission {
        NewSubmission::new(submitter_id, "file-abc", MediaKind::Photo)
    }

    #[tokio::test]
    async fn enqueue_assigns_unique_ids_and_persists_pending() {
        let (queue, _events) = queue_with_capacity(10);

        let a = queue.enqueue(submission(1)).await.unwrap();
        let b = queue.enqueue(submission(1)).await.unwrap();
        assert_ne!(a, b);

        let item = queue.get(&a).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert_eq!(item.submitter_id, 1);
        assert!(item.decided_by.is_none());
        assert!(item.decided_at.is_none());
    }

    #[tokio::test]
    async fn enqueue_fails_at_capacity() {
        let (queue, _events) = queue_with_capacity(3);

        for _ in 0..3 {
            queue.enqueue(submission(1)).await.unwrap();
        }

        let result = queue.enqueue(submission(2)).await;
        assert!(matches!(result, Err(QueueError::Full { capacity: 3 })));

        // A decision frees a slot.
        let pending = queue.list(Some(ItemStatus::Pending)).await.unwrap();
        queue
            .decide(&pending[0].id, Decision::Approve, 99)
            .await
            .unwrap();
        assert!(queue.enqueue(submission(2)).await.is_ok());
    }

    #[tokio::test]
    async fn enqueue_with_token_is_idempotent() {
        let (queue, _events) = queue_with_capacity(5);

        let sub = submission(1).with_idempotency_token("retry-token-1");
        let first = queue.enqueue(sub.clone()).await.unwrap();
        let second = queue.enqueue(sub).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(queue.list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn decide_transitions_exactly_once() {
        let (queue, _events) = queue_with_capacity(5);
        let id = queue.enqueue(submission(1)).await.unwrap();

        let decided = queue.decide(&id, Decision::Approve, 42).await.unwrap();
        assert_eq!(decided.status, ItemStatus::Approved);
        assert_eq!(decided.decided_by, Some(42));
        assert!(decided.decided_at.is_some());

        // Second decision - any direction - is refused.
        assert!(matches!(
            queue.decide(&id, Decision::Reject, 42).await,
            Err(QueueError::AlreadyDecided(_))
        ));
        assert!(matches!(
            queue.decide(&id, Decision::Approve, 42).await,
            Err(QueueError::AlreadyDecided(_))
        ));

        // The stored status never reverted.
        let item = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Approved);
    }

    #[tokio::test]
    async fn decide_unknown_id_is_not_found() {
        let (queue, _events) = queue_with_capacity(5);
        assert!(matches!(
            queue.decide("missing", Decision::Approve, 1).await,
            Err(QueueError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn concurrent_decisions_have_exactly_one_winner() {
        let (queue, _events) = queue_with_capacity(5);
        let queue = Arc::new(queue);
        let id = queue.enqueue(submission(1)).await.unwrap();

        let approve = {
            let queue = Arc::clone(&queue);
            let id = id.clone();
            tokio::spawn(async move { queue.decide(&id, Decision::Approve, 1).await })
        };
        let reject = {
            let queue = Arc::clone(&queue);
            let id = id.clone();
            tokio::spawn(async move { queue.decide(&id, Decision::Reject, 2).await })
        };

        let approve = approve.await.unwrap();
        let reject = reject.await.unwrap();

        // Exactly one decision applied; the loser saw AlreadyDecided.
        assert!(approve.is_ok() != reject.is_ok());
        let loser = if approve.is_ok() { reject } else { approve };
        assert!(matches!(loser, Err(QueueError::AlreadyDecided(_))));

        // Final status matches whichever call won.
        let final_status = queue.get(&id).await.unwrap().unwrap().status;
        assert!(final_status.is_terminal());
    }

    #[tokio::test]
    async fn bulk_decide_reports_per_id_results() {
        let (queue, _events) = queue_with_capacity(5);

        let fresh = queue.enqueue(submission(1)).await.unwrap();
        let already = queue.enqueue(submission(2)).await.unwrap();
        queue.decide(&already, Decision::Approve, 9).await.unwrap();

        let ids = vec![fresh.clone(), already.clone(), "ghost".to_string()];
        let results = queue.bulk_decide(&ids, Decision::Reject, 9).await;
        assert_eq!(results.len(), 3);

        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(QueueError::AlreadyDecided(_))));
        assert!(matches!(results[2].1, Err(QueueError::NotFound(_))));

        // The batch never rolled back the successful one.
        let item = queue.get(&fresh).await.unwrap().unwrap();
        assert_eq!(item.status, ItemStatus::Rejected);
    }

    #[tokio::test]
    async fn list_preserves_insertion_order_and_filters() {
        let (queue, _events) = queue_with_capacity(10);

        let first = queue.enqueue(submission(1)).await.unwrap();
        let second = queue.enqueue(submission(2)).await.unwrap();
        let third = queue.enqueue(submission(3)).await.unwrap();
        queue.decide(&second, Decision::Approve, 9).await.unwrap();

        let pending = queue.list(Some(ItemStatus::Pending)).await.unwrap();
        assert_eq!(
            pending.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec![first.as_str(), third.as_str()]
        );

        let approved = queue.list(Some(ItemStatus::Approved)).await.unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, second);

        // Unfiltered list keeps global insertion order.
        let all = queue.list(None).await.unwrap();
        assert_eq!(
            all.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            vec![first.as_str(), second.as_str(), third.as_str()]
        );
    }

    #[tokio::test]
    async fn list_is_a_snapshot() {
        let (queue, _events) = queue_with_capacity(10);
        let id = queue.enqueue(submission(1)).await.unwrap();

        let before = queue.list(Some(ItemStatus::Pending)).await.unwrap();
        queue.decide(&id, Decision::Reject, 9).await.unwrap();

        // The already-returned sequence is untouched by the later mutation.
        assert_eq!(before.len(), 1);
        assert_eq!(before[0].status, ItemStatus::Pending);
    }

    #[tokio::test]
    async fn purge_removes_terminal_items_only() {
        let (queue, _events) = queue_with_capacity(10);

        let pending = queue.enqueue(submission(1)).await.unwrap();
        let decided = queue.enqueue(submission(2)).await.unwrap();
        queue.decide(&decided, Decision::Approve, 9).await.unwrap();

        // Pending: silent no-op, the item stays.
        queue.purge(&pending).await.unwrap();
        assert!(queue.get(&pending).await.unwrap().is_some());

        // Terminal: removed. A second purge is a silent no-op.
        queue.purge(&decided).await.unwrap();
        assert!(queue.get(&decided).await.unwrap().is_none());
        queue.purge(&decided).await.unwrap();
    }

    #[tokio::test]
    async fn decisions_emit_events_after_durable_write() {
        let (queue, mut events) = queue_with_capacity(5);

        let id = queue.enqueue(submission(7)).await.unwrap();
        queue.decide(&id, Decision::Reject, 3).await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.item_id, id);
        assert_eq!(event.submitter_id, 7);
        assert_eq!(event.status, ItemStatus::Rejected);
        assert_eq!(event.decided_by, 3);
    }

    #[tokio::test]
    async fn dropped_notifier_does_not_fail_decisions() {
        let (queue, events) = queue_with_capacity(5);
        drop(events);

        let id = queue.enqueue(submission(1)).await.unwrap();
        assert!(queue.decide(&id, Decision::Approve, 9).await.is_ok());
    }

    #[tokio::test]
    async fn stats_reflect_queue_contents() {
        let (queue, _events) = queue_with_capacity(10);

        let a = queue.enqueue(submission(1)).await.unwrap();
        queue
            .enqueue(NewSubmission::new(2, "file-v", MediaKind::Video))
            .await
            .unwrap();
        queue.decide(&a, Decision::Approve, 9).await.unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.rejected, 0);
        assert!(stats.oldest_pending.is_some());
    }

    #[tokio::test]
    async fn per_user_pending_counts() {
        let (queue, _events) = queue_with_capacity(10);

        queue.enqueue(submission(1)).await.unwrap();
        queue.enqueue(submission(1)).await.unwrap();
        let other = queue.enqueue(submission(2)).await.unwrap();
        queue.decide(&other, Decision::Approve, 9).await.unwrap();

        assert_eq!(queue.pending_count_for(1).await.unwrap(), 2);
        assert_eq!(queue.pending_count_for(2).await.unwrap(), 0);
    }
}
