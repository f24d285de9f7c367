// Lexicon store - loads word lists, compiles them into per-script matchers,
// and swaps the active set atomically on reload.
//
// The whole lexicon is compiled ONCE per (re)load into a combined regex per
// script, not per screening call. Screenings grab an `Arc` to the active
// snapshot and keep using it even if a reload lands mid-flight, so every call
// sees exactly one consistent lexicon version.

use super::lexicon_models::{LexiconDocument, LexiconEntry, LexiconHit, Script};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LexiconError {
    #[error("invalid lexicon source: {0}")]
    Config(String),

    #[error("failed to read lexicon source: {0}")]
    Io(String),

    #[error("failed to compile matcher for {script}: {reason}")]
    BadPattern { script: Script, reason: String },
}

// ============================================================================
// SOURCE TRAIT (PORT)
// ============================================================================

/// Where word lists come from. The core only cares that it gets a document;
/// the infra layer decides whether that is a JSON file, a database, etc.
#[async_trait]
pub trait LexiconSource: Send + Sync {
    async fn load(&self) -> Result<LexiconDocument, LexiconError>;
}

// ============================================================================
// NORMALIZATION
// ============================================================================
// The obfuscation rules are a tunable policy, not a contract. Both passes are
// total over arbitrary Unicode input and never fail.

/// A normalized rendering of some text plus, for every byte of it, the byte
/// offset of the original character it came from. Matches found in the
/// normalized form are reported at their original position through this map,
/// so hits from different matching modes compare on the same axis.
pub(crate) struct Normalized {
    pub(crate) text: String,
    origins: Vec<usize>,
}

impl Normalized {
    /// Original byte offset of the character behind the given normalized
    /// byte. `byte` must index into `text`.
    pub(crate) fn origin(&self, byte: usize) -> usize {
        self.origins[byte]
    }
}

/// Lowercase the text and apply the character substitution table
/// (leet digits/symbols back to letters). Lowercasing may expand a character
/// into several; every produced byte keeps the source character's offset.
pub(crate) fn fold(text: &str, substitutions: &[(char, char)]) -> Normalized {
    let mut out = String::with_capacity(text.len());
    let mut origins = Vec::with_capacity(text.len());
    for (pos, c) in text.char_indices() {
        for lower in c.to_lowercase() {
            let mapped = substitutions
                .iter()
                .find(|(from, _)| *from == lower)
                .map(|(_, to)| *to)
                .unwrap_or(lower);
            out.push(mapped);
            origins.extend(std::iter::repeat(pos).take(mapped.len_utf8()));
        }
    }
    Normalized { text: out, origins }
}

/// Collapse runs of the same character ("fuuuck" -> "fuck"), keeping the
/// origin of the first character of each run.
pub(crate) fn squeeze(normalized: &Normalized) -> Normalized {
    let mut out = String::with_capacity(normalized.text.len());
    let mut origins = Vec::with_capacity(normalized.origins.len());
    let mut last: Option<char> = None;
    for (pos, c) in normalized.text.char_indices() {
        if last != Some(c) {
            out.push(c);
            origins.extend(std::iter::repeat(normalized.origin(pos)).take(c.len_utf8()));
            last = Some(c);
        }
    }
    Normalized { text: out, origins }
}

// ============================================================================
// COMPILED SNAPSHOT
// ============================================================================

/// A needle for strict-mode substring scanning, precomputed in both folded
/// and squeezed form.
struct Needle {
    /// The configured pattern, reported back on a hit.
    pattern: String,
    folded: String,
    squeezed: String,
}

/// Matchers for a single script, built once at load time.
struct CompiledScript {
    script: Script,
    /// Combined whole-word alternation; group 1 captures the token.
    whole_word: Option<Regex>,
    needles: Vec<Needle>,
    /// Folded pattern -> censor replacement, for entries that carry one.
    replacements: HashMap<String, String>,
}

/// An immutable, fully compiled lexicon. Cheap to share via `Arc`.
pub struct LexiconSnapshot {
    scripts: Vec<CompiledScript>,
    substitutions: Vec<(char, char)>,
    entry_count: usize,
}

impl LexiconSnapshot {
    pub fn compile(
        doc: &LexiconDocument,
        substitutions: &[(char, char)],
    ) -> Result<Self, LexiconError> {
        let mut scripts = Vec::with_capacity(Script::ALL.len());
        let mut entry_count = 0;

        for script in Script::ALL {
            let entries = doc.entries(script);
            entry_count += entries.len();
            scripts.push(Self::compile_script(script, &entries, substitutions)?);
        }

        Ok(Self {
            scripts,
            substitutions: substitutions.to_vec(),
            entry_count,
        })
    }

    fn compile_script(
        script: Script,
        entries: &[LexiconEntry],
        substitutions: &[(char, char)],
    ) -> Result<CompiledScript, LexiconError> {
        // An empty pattern would match everywhere; drop it here rather than
        // poison the alternation and the substring scans.
        let entries: Vec<&LexiconEntry> =
            entries.iter().filter(|e| !e.pattern.is_empty()).collect();

        let whole_word = if entries.is_empty() {
            None
        } else {
            let alternation = entries
                .iter()
                .map(|e| regex::escape(&e.pattern))
                .collect::<Vec<_>>()
                .join("|");

            // Latin scripts get real word boundaries; Persian script has no
            // \b-friendly alphabet in regex terms, so the boundary is
            // "anything that is not a Persian letter", the same trick the
            // original deployment used.
            let pattern = if script.is_latin() {
                format!(r"(?i)\b({alternation})\b")
            } else {
                format!(
                    r"(?:^|[^\u{{0600}}-\u{{06FF}}])({alternation})(?:[^\u{{0600}}-\u{{06FF}}]|$)"
                )
            };

            Some(Regex::new(&pattern).map_err(|e| LexiconError::BadPattern {
                script,
                reason: e.to_string(),
            })?)
        };

        // Needles only apply the Latin folding to Latin scripts; Persian
        // strict mode is a plain substring scan.
        let subs: &[(char, char)] = if script.is_latin() { substitutions } else { &[] };

        let mut replacements = HashMap::new();
        let needles = entries
            .iter()
            .map(|entry| {
                let folded = fold(&entry.pattern, subs);
                if let Some(replacement) = &entry.replacement {
                    replacements.insert(folded.text.clone(), replacement.clone());
                }
                Needle {
                    pattern: entry.pattern.clone(),
                    squeezed: squeeze(&folded).text,
                    folded: folded.text,
                }
            })
            .collect();

        Ok(CompiledScript {
            script,
            whole_word,
            needles,
            replacements,
        })
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Find the earliest-starting disallowed token, if any.
    ///
    /// Non-strict mode only counts exact whole-word matches. Strict mode also
    /// scans for substrings and obfuscated variants of the configured
    /// patterns.
    pub fn first_match(&self, text: &str, strict: bool) -> Option<LexiconHit> {
        let mut best: Option<LexiconHit> = None;

        for compiled in &self.scripts {
            if let Some(re) = &compiled.whole_word {
                if let Some(caps) = re.captures(text) {
                    if let Some(token) = caps.get(1) {
                        consider(
                            &mut best,
                            LexiconHit {
                                script: compiled.script,
                                token: token.as_str().to_string(),
                                start: token.start(),
                            },
                        );
                    }
                }
            }

            if !strict || compiled.needles.is_empty() {
                continue;
            }

            let subs: &[(char, char)] = if compiled.script.is_latin() {
                &self.substitutions
            } else {
                &[]
            };
            let folded_text = fold(text, subs);
            let squeezed_text = squeeze(&folded_text);

            for needle in &compiled.needles {
                // Positions in the normalized forms are mapped back to the
                // original text before competing with whole-word hits.
                let found = folded_text
                    .text
                    .find(&needle.folded)
                    .map(|at| folded_text.origin(at))
                    .or_else(|| {
                        squeezed_text
                            .text
                            .find(&needle.squeezed)
                            .map(|at| squeezed_text.origin(at))
                    });
                if let Some(start) = found {
                    consider(
                        &mut best,
                        LexiconHit {
                            script: compiled.script,
                            token: needle.pattern.clone(),
                            start,
                        },
                    );
                }
            }
        }

        best
    }

    /// Render the text with every whole-word match censored: the entry's
    /// replacement token when configured, otherwise asterisks of equal
    /// length.
    pub fn censor(&self, text: &str) -> String {
        let mut out = text.to_string();

        for compiled in &self.scripts {
            let Some(re) = &compiled.whole_word else {
                continue;
            };
            let subs: &[(char, char)] = if compiled.script.is_latin() {
                &self.substitutions
            } else {
                &[]
            };

            out = re
                .replace_all(&out, |caps: &regex::Captures| {
                    // The full match may include boundary characters (the
                    // Persian pattern consumes them); keep those and only
                    // replace the captured token.
                    let full = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                    let Some(token) = caps.get(1) else {
                        return full.to_string();
                    };
                    let Some(whole) = caps.get(0) else {
                        return full.to_string();
                    };
                    let prefix = &full[..token.start() - whole.start()];
                    let suffix = &full[token.end() - whole.start()..];

                    let censored = compiled
                        .replacements
                        .get(&fold(token.as_str(), subs).text)
                        .cloned()
                        .unwrap_or_else(|| "*".repeat(token.as_str().chars().count()));

                    format!("{prefix}{censored}{suffix}")
                })
                .into_owned();
        }

        out
    }
}

fn consider(best: &mut Option<LexiconHit>, candidate: LexiconHit) {
    match best {
        Some(current) if current.start <= candidate.start => {}
        _ => *best = Some(candidate),
    }
}

// ============================================================================
// STORE
// ============================================================================

/// Owns the active lexicon snapshot and the source it was loaded from.
///
/// Constructed once at startup; `reload` re-reads the source and atomically
/// swaps the snapshot. A failed reload keeps the previous snapshot active, so
/// the store is never left matcher-less.
pub struct LexiconStore {
    source: Box<dyn LexiconSource>,
    substitutions: Vec<(char, char)>,
    active: RwLock<Arc<LexiconSnapshot>>,
}

impl LexiconStore {
    pub async fn load(
        source: Box<dyn LexiconSource>,
        substitutions: Vec<(char, char)>,
    ) -> Result<Self, LexiconError> {
        let doc = source.load().await?;
        let snapshot = LexiconSnapshot::compile(&doc, &substitutions)?;
        tracing::info!(entries = snapshot.entry_count(), "lexicon loaded");

        Ok(Self {
            source,
            substitutions,
            active: RwLock::new(Arc::new(snapshot)),
        })
    }

    /// Re-read the source and swap the active snapshot. Returns the new entry
    /// count. On any failure the previous snapshot stays active.
    pub async fn reload(&self) -> Result<usize, LexiconError> {
        let doc = self.source.load().await?;
        let snapshot = Arc::new(LexiconSnapshot::compile(&doc, &self.substitutions)?);
        let entries = snapshot.entry_count();

        match self.active.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }

        tracing::info!(entries, "lexicon reloaded");
        Ok(entries)
    }

    /// The currently active snapshot. Callers hold the returned `Arc` for the
    /// duration of one screening so a concurrent reload cannot give them a
    /// mixed view.
    pub fn snapshot(&self) -> Arc<LexiconSnapshot> {
        match self.active.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Default leet-speak substitution table for the Latin scripts.
    pub fn default_substitutions() -> Vec<(char, char)> {
        vec![
            ('0', 'o'),
            ('1', 'i'),
            ('3', 'e'),
            ('4', 'a'),
            ('5', 's'),
            ('7', 't'),
            ('@', 'a'),
            ('$', 's'),
            ('!', 'i'),
        ]
    }
}
