// Queue domain models - pure data types with no storage or transport
// dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Broad kind of a queued media submission. The core never interprets the
/// media itself; the kind only matters to the publication collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Video,
    Other,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Other => "other",
        }
    }

    /// Parse the durable representation. Unknown kinds land on `Other` so an
    /// old database never blocks startup.
    pub fn parse(raw: &str) -> MediaKind {
        match raw {
            "photo" => MediaKind::Photo,
            "video" => MediaKind::Video,
            _ => MediaKind::Other,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation state of a queued item.
///
/// The only legal transitions are Pending -> Approved and Pending ->
/// Rejected. Approved and Rejected are terminal; nothing moves an item out of
/// them, and nothing decides an item twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Approved,
    Rejected,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Approved => "approved",
            ItemStatus::Rejected => "rejected",
        }
    }

    pub fn parse(raw: &str) -> Option<ItemStatus> {
        match raw {
            "pending" => Some(ItemStatus::Pending),
            "approved" => Some(ItemStatus::Approved),
            "rejected" => Some(ItemStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An admin's verdict on a pending item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn terminal_status(self) -> ItemStatus {
        match self {
            Decision::Approve => ItemStatus::Approved,
            Decision::Reject => ItemStatus::Rejected,
        }
    }
}

/// A media submission held for moderation.
///
/// `id` is globally unique and immutable once assigned. The queue owns the
/// item for its whole lifetime; collaborators only ever get copies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    pub id: String,
    pub submitter_id: u64,
    /// Opaque handle to the stored media (e.g. a platform file id). Never
    /// interpreted by the core.
    pub media_ref: String,
    pub media_kind: MediaKind,
    pub caption: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: ItemStatus,
    pub decided_by: Option<u64>,
    pub decided_at: Option<DateTime<Utc>>,
}

/// Input for a new enqueue.
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub submitter_id: u64,
    pub media_ref: String,
    pub media_kind: MediaKind,
    pub caption: Option<String>,
    /// When set, the token becomes the item id, so a retried enqueue after an
    /// ambiguous failure finds the existing row instead of duplicating it.
    pub idempotency_token: Option<String>,
}

impl NewSubmission {
    pub fn new(submitter_id: u64, media_ref: impl Into<String>, media_kind: MediaKind) -> Self {
        Self {
            submitter_id,
            media_ref: media_ref.into(),
            media_kind,
            caption: None,
            idempotency_token: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_idempotency_token(mut self, token: impl Into<String>) -> Self {
        self.idempotency_token = Some(token.into());
        self
    }
}

/// Emitted on the notifier channel after a decision has been durably
/// recorded. The notification collaborator consumes these asynchronously;
/// durability never waits for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionEvent {
    pub item_id: String,
    pub submitter_id: u64,
    pub status: ItemStatus,
    pub decided_by: u64,
}

/// Aggregate view of the queue for the admin stats surface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueStats {
    pub total: u64,
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub by_kind: Vec<(MediaKind, u64)>,
    pub oldest_pending: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(!ItemStatus::Pending.is_terminal());
        assert!(ItemStatus::Approved.is_terminal());
        assert!(ItemStatus::Rejected.is_terminal());
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [ItemStatus::Pending, ItemStatus::Approved, ItemStatus::Rejected] {
            assert_eq!(ItemStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ItemStatus::parse("garbage"), None);
    }

    #[test]
    fn unknown_media_kind_falls_back_to_other() {
        assert_eq!(MediaKind::parse("photo"), MediaKind::Photo);
        assert_eq!(MediaKind::parse("sticker"), MediaKind::Other);
    }

    #[test]
    fn decisions_map_to_terminal_statuses() {
        assert_eq!(Decision::Approve.terminal_status(), ItemStatus::Approved);
        assert_eq!(Decision::Reject.terminal_status(), ItemStatus::Rejected);
    }
}
