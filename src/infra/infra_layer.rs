// The infra module contains implementations of core traits.
// Each feature implementation goes in its own submodule.

#[path = "lexicon/json_lexicon_source.rs"]
pub mod lexicon;

#[path = "queue/media_stores.rs"]
pub mod queue;
