// Moderation queue module - pending media items and their decision workflow.

pub mod queue_models;
pub mod queue_service;

pub use queue_models::{
    Decision, DecisionEvent, ItemStatus, MediaKind, NewSubmission, PendingItem, QueueStats,
};
pub use queue_service::{MediaStore, ModerationQueue, QueueError};
