// The core module contains all business logic.
// Each feature gets its own submodule; nothing in here knows about the
// messaging transport.

pub mod config;

#[path = "lexicon/mod.rs"]
pub mod lexicon;

#[path = "queue/mod.rs"]
pub mod queue;

#[path = "screening/screening_service.rs"]
pub mod screening;

#[path = "pipeline/content_service.rs"]
pub mod pipeline;
