// Lexicon domain models - the external word-list representation and the
// match report handed back to callers.
//
// These are pure data types; compilation into matchers lives in
// `lexicon_store`.

use serde::{Deserialize, Serialize};

/// Script a lexicon entry belongs to.
///
/// The bot serves a Persian-speaking channel, so the three scripts are fixed:
/// Persian (Arabic script), English, and Persian written in Latin letters
/// ("Finglish").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Script {
    Persian,
    English,
    PersianLatin,
}

impl Script {
    pub const ALL: [Script; 3] = [Script::Persian, Script::English, Script::PersianLatin];

    /// Latin-script entries get word-boundary matching and obfuscation
    /// normalization; Persian script needs its own boundary handling.
    pub fn is_latin(self) -> bool {
        matches!(self, Script::English | Script::PersianLatin)
    }
}

impl std::fmt::Display for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Script::Persian => write!(f, "persian"),
            Script::English => write!(f, "english"),
            Script::PersianLatin => write!(f, "persian_latin"),
        }
    }
}

/// One entry as it appears in the word-list file.
///
/// Plain strings are the common case; the object form adds a custom censor
/// replacement. Loading and re-serializing an unmodified document keeps the
/// same semantics either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordSpec {
    Plain(String),
    Detailed {
        pattern: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        replacement: Option<String>,
    },
}

/// Normalized form of a `WordSpec` used by the compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct LexiconEntry {
    pub pattern: String,
    /// Censor token; `None` renders as asterisks of matching length.
    pub replacement: Option<String>,
}

impl From<&WordSpec> for LexiconEntry {
    fn from(spec: &WordSpec) -> Self {
        match spec {
            WordSpec::Plain(pattern) => LexiconEntry {
                pattern: pattern.clone(),
                replacement: None,
            },
            WordSpec::Detailed {
                pattern,
                replacement,
            } => LexiconEntry {
                pattern: pattern.clone(),
                replacement: replacement.clone(),
            },
        }
    }
}

/// The external word-list document: script name -> ordered entry list.
///
/// Field names match the JSON keys the original deployment already used, so
/// existing `profanity_words.json` files keep working.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LexiconDocument {
    #[serde(default)]
    pub persian: Vec<WordSpec>,
    #[serde(default)]
    pub english: Vec<WordSpec>,
    #[serde(default)]
    pub persian_latin: Vec<WordSpec>,
}

impl LexiconDocument {
    pub fn entries(&self, script: Script) -> Vec<LexiconEntry> {
        self.specs(script).iter().map(LexiconEntry::from).collect()
    }

    pub fn specs(&self, script: Script) -> &[WordSpec] {
        match script {
            Script::Persian => &self.persian,
            Script::English => &self.english,
            Script::PersianLatin => &self.persian_latin,
        }
    }

    pub fn specs_mut(&mut self, script: Script) -> &mut Vec<WordSpec> {
        match script {
            Script::Persian => &mut self.persian,
            Script::English => &mut self.english,
            Script::PersianLatin => &mut self.persian_latin,
        }
    }

    pub fn entry_count(&self) -> usize {
        self.persian.len() + self.english.len() + self.persian_latin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }
}

/// A single reported match: which script flagged, the offending token, and
/// where it started.
///
/// `start` is a byte offset into the original text for every matching mode.
/// Strict-mode matches are found in a normalized rendering and mapped back
/// through its origin map before being reported, so hits from different
/// modes compare on the same axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconHit {
    pub script: Script,
    pub token: String,
    pub start: usize,
}
