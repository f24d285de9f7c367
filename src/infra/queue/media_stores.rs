// Implementations of the moderation queue's storage port.
#![allow(unused_imports)]

pub mod in_memory;
pub mod sqlite_media_store;

// Re-export for convenience
pub use in_memory::InMemoryMediaStore;
pub use sqlite_media_store::SqliteMediaStore;
