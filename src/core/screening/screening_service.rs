// Profanity screener - decides pass/fail for free text against the active
// lexicon.
//
// This is a pure function over (text, strict flag, active lexicon snapshot):
// no storage, no network, no hidden state. Each call pins exactly one
// snapshot, so a concurrent lexicon reload can never give a single screening
// a mixed view.

use crate::core::lexicon::{LexiconHit, LexiconStore};
use std::sync::Arc;

/// Outcome of screening one piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenResult {
    pub clean: bool,
    /// Earliest-starting disallowed token, when the text is not clean.
    pub first_match: Option<LexiconHit>,
}

impl ScreenResult {
    fn clean() -> Self {
        Self {
            clean: true,
            first_match: None,
        }
    }

    fn flagged(hit: LexiconHit) -> Self {
        Self {
            clean: false,
            first_match: Some(hit),
        }
    }
}

pub struct ScreeningService {
    lexicon: Arc<LexiconStore>,
}

impl ScreeningService {
    pub fn new(lexicon: Arc<LexiconStore>) -> Self {
        Self { lexicon }
    }

    /// Screen text against all three scripts' matchers.
    ///
    /// Non-strict mode counts only exact whole-word matches. Strict mode also
    /// flags substrings and obfuscated variants (repeated characters, leet
    /// substitutions). Length limits are the caller's job; the screener is
    /// length-agnostic.
    pub fn screen(&self, text: &str, strict: bool) -> ScreenResult {
        let snapshot = self.lexicon.snapshot();
        match snapshot.first_match(text, strict) {
            Some(hit) => ScreenResult::flagged(hit),
            None => ScreenResult::clean(),
        }
    }

    /// Censored rendering of the text: whole-word matches become their
    /// configured replacement or same-length asterisks.
    pub fn censor(&self, text: &str) -> String {
        self.lexicon.snapshot().censor(text)
    }
}
