/*!
 * Word commonness lookup.
 *
 * Scores follow the Zipf convention: higher means more common, roughly
 * 1 (rare) to 8 (ubiquitous). A word or language the source does not know
 * is reported as absent, never as zero.
 */

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use unicode_normalization::UnicodeNormalization;

use crate::language_utils;

/// Capability to look up how common a word is in a language.
pub trait LexicalScorer: Send + Sync {
    /// Commonness of `word` in `language`, or `None` when unknown.
    fn score(&self, word: &str, language: &str) -> Option<f64>;

    /// Whether any word of `language` can be scored at all.
    fn supports_language(&self, language: &str) -> bool;
}

type RawTable = HashMap<String, HashMap<String, f64>>;

/// In-memory frequency table keyed by language then lowercase NFC word.
///
/// Serialized as `{"en": {"the": 7.73, ...}, "fr": {...}}`. Deserialized
/// keys go through the same normalization as `extend`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "RawTable", into = "RawTable")]
pub struct FrequencyTable {
    languages: RawTable,
}

impl From<RawTable> for FrequencyTable {
    fn from(raw: RawTable) -> Self {
        let mut table = Self::new();
        for (language, words) in raw {
            table.extend(&language, words);
        }
        table
    }
}

impl From<FrequencyTable> for RawTable {
    fn from(table: FrequencyTable) -> Self {
        table.languages
    }
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open frequency table: {}", path.display()))?;
        let table: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse frequency table: {}", path.display()))?;

        debug!(
            "Loaded frequency table with {} language(s) from {}",
            table.languages.len(),
            path.display()
        );
        Ok(table)
    }

    /// Add or replace entries for a language.
    pub fn extend<I, W>(&mut self, language: &str, words: I)
    where
        I: IntoIterator<Item = (W, f64)>,
        W: AsRef<str>,
    {
        let entry = self.languages.entry(language_key(language)).or_default();
        for (word, score) in words {
            entry.insert(normalize_word(word.as_ref()), score);
        }
    }

    pub fn insert(&mut self, language: &str, word: &str, score: f64) {
        self.extend(language, [(word, score)]);
    }

    /// Number of words known for a language.
    pub fn word_count(&self, language: &str) -> usize {
        self.languages
            .get(&language_key(language))
            .map_or(0, HashMap::len)
    }
}

impl LexicalScorer for FrequencyTable {
    fn score(&self, word: &str, language: &str) -> Option<f64> {
        self.languages
            .get(&language_key(language))?
            .get(&normalize_word(word))
            .copied()
            .filter(|score| *score > 0.0)
    }

    fn supports_language(&self, language: &str) -> bool {
        self.languages
            .get(&language_key(language))
            .is_some_and(|words| !words.is_empty())
    }
}

/// Lookup form of a word: composed (NFC) and lowercase.
pub fn normalize_word(word: &str) -> String {
    word.nfc().collect::<String>().to_lowercase()
}

/// Tables are keyed by the 639-1 code where one exists, so `pt-BR`, `por`
/// and `pt` all reach the same words.
fn language_key(language: &str) -> String {
    language_utils::normalize_language_code(language)
        .unwrap_or_else(|_| language.trim().to_lowercase())
}
