// Lexicon module - word lists per script and their compiled matchers.

pub mod lexicon_models;
pub mod lexicon_store;

pub use lexicon_models::{LexiconDocument, LexiconEntry, LexiconHit, Script, WordSpec};
pub use lexicon_store::{LexiconError, LexiconSnapshot, LexiconSource, LexiconStore};
