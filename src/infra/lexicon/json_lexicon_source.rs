// JSON-file lexicon source.
//
// Reads the same `data/profanity_words.json` layout the original deployment
// used: script name -> ordered list of entries. A missing file falls back to
// the built-in defaults; a present file is merged with them (deduplicated per
// script) so operators only maintain their additions.

use crate::core::lexicon::{LexiconDocument, LexiconError, LexiconSource, Script, WordSpec};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;

pub struct JsonLexiconSource {
    path: PathBuf,
}

impl JsonLexiconSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Built-in word lists, kept in sync with the channel's house rules.
    /// Mild entries only; the real deployment extends these via the file.
    pub fn default_document() -> LexiconDocument {
        fn words(list: &[&str]) -> Vec<WordSpec> {
            list.iter().map(|w| WordSpec::Plain(w.to_string())).collect()
        }

        LexiconDocument {
            english: words(&[
                "fuck", "shit", "bitch", "asshole", "bastard", "damn", "wtf", "stfu",
            ]),
            persian: words(&[
                "کیر", "کس", "جنده", "لاشی", "حرومزاده", "کونی", "کسکش", "جاکش",
                "بیشرف", "هرزه", "پدرسگ",
            ]),
            persian_latin: words(&[
                "kir", "kos", "jende", "lashi", "haramzade", "kuni", "koskesh", "jakesh",
                "bisharaf", "harze", "pedarsag", "gomsho",
            ]),
        }
    }

    /// Merge the defaults into a loaded document, deduplicating per script by
    /// pattern (file entries win, defaults fill the gaps).
    fn merge_defaults(mut doc: LexiconDocument) -> LexiconDocument {
        let defaults = Self::default_document();

        for script in Script::ALL {
            let seen: HashSet<String> = doc
                .specs(script)
                .iter()
                .map(|spec| pattern_of(spec).to_string())
                .collect();

            let missing: Vec<WordSpec> = defaults
                .specs(script)
                .iter()
                .filter(|spec| !seen.contains(pattern_of(spec)))
                .cloned()
                .collect();
            doc.specs_mut(script).extend(missing);
        }

        doc
    }
}

fn pattern_of(spec: &WordSpec) -> &str {
    match spec {
        WordSpec::Plain(pattern) => pattern,
        WordSpec::Detailed { pattern, .. } => pattern,
    }
}

#[async_trait]
impl LexiconSource for JsonLexiconSource {
    async fn load(&self) -> Result<LexiconDocument, LexiconError> {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "no word-list file, using built-in defaults");
            return Ok(Self::default_document());
        }

        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| LexiconError::Io(format!("{}: {e}", self.path.display())))?;

        let doc: LexiconDocument = serde_json::from_str(&raw)
            .map_err(|e| LexiconError::Config(format!("{}: {e}", self.path.display())))?;

        Ok(Self::merge_defaults(doc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonLexiconSource::new(dir.path().join("nope.json"));

        let doc = source.load().await.unwrap();
        assert_eq!(doc, JsonLexiconSource::default_document());
        assert!(!doc.is_empty());
    }

    #[tokio::test]
    async fn file_entries_are_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        // One custom word plus one that duplicates a default.
        std::fs::write(&path, r#"{"english": ["sod", "damn"]}"#).unwrap();

        let doc = JsonLexiconSource::new(&path).load().await.unwrap();

        let patterns: Vec<&str> = doc.english.iter().map(pattern_of).collect();
        assert_eq!(patterns.iter().filter(|p| **p == "damn").count(), 1);
        assert!(patterns.contains(&"sod"));
        // Defaults for untouched scripts are still present.
        assert!(!doc.persian.is_empty());
        assert!(!doc.persian_latin.is_empty());
    }

    #[tokio::test]
    async fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        std::fs::write(&path, "{ this is not json").unwrap();

        let result = JsonLexiconSource::new(&path).load().await;
        assert!(matches!(result, Err(LexiconError::Config(_))));
    }

    #[tokio::test]
    async fn detailed_entries_survive_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.json");
        std::fs::write(
            &path,
            r#"{"english": [{"pattern": "sod", "replacement": "s**"}]}"#,
        )
        .unwrap();

        let doc = JsonLexiconSource::new(&path).load().await.unwrap();
        assert!(matches!(
            &doc.english[0],
            WordSpec::Detailed { pattern, replacement: Some(r) }
                if pattern == "sod" && r == "s**"
        ));
    }
}
