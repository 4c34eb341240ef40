/*!
 * Sentence difficulty scoring and level classification.
 *
 * A sentence's score is the arithmetic mean of its tokens' commonness.
 * Tokens the lexicon does not know contribute a fixed low penalty value
 * instead of being skipped, so unfamiliar vocabulary pulls the score down.
 */

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use unicode_normalization::UnicodeNormalization;

use crate::document::Sentence;

use super::level::{ProficiencyLevel, ThresholdTable};
use super::lexicon::LexicalScorer;

/// Commonness assumed for words the lexicon does not know
pub const DEFAULT_UNKNOWN_WORD_PENALTY: f64 = 2.0;

/// Letter runs with their combining marks, optionally joined by an
/// apostrophe (don't, l'homme)
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\p{L}\p{M}]+(?:['’][\p{L}\p{M}]+)*").expect("word pattern is valid")
});

/// Split text into lowercase NFC word tokens.
///
/// Decomposed input (`e` + U+0301) yields the same tokens as its
/// precomposed form.
pub fn tokenize(text: &str) -> Vec<String> {
    let composed: String = text.nfc().collect();
    WORD_PATTERN
        .find_iter(&composed)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Detailed scoring of one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceScore {
    /// Level derived from the mean
    pub level: ProficiencyLevel,

    /// Mean token commonness, `None` for a sentence without words
    pub mean: Option<f64>,

    /// Lowest token commonness (the hardest word)
    pub min: Option<f64>,

    pub token_count: usize,

    /// Tokens that fell back to the penalty value
    pub unknown_count: usize,

    pub avg_word_length: f64,
}

impl SentenceScore {
    fn empty() -> Self {
        Self {
            level: ProficiencyLevel::A1,
            mean: None,
            min: None,
            token_count: 0,
            unknown_count: 0,
            avg_word_length: 0.0,
        }
    }

    /// A sentence with no word tokens (punctuation, numbers, ornaments)
    pub fn is_empty(&self) -> bool {
        self.token_count == 0
    }

    pub fn unknown_ratio(&self) -> f64 {
        if self.token_count == 0 {
            return 0.0;
        }
        self.unknown_count as f64 / self.token_count as f64
    }
}

/// Maps sentence text to a proficiency level.
#[derive(Clone)]
pub struct LevelClassifier {
    scorer: Arc<dyn LexicalScorer>,
    thresholds: ThresholdTable,
    unknown_word_penalty: f64,
}

impl std::fmt::Debug for LevelClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelClassifier")
            .field("thresholds", &self.thresholds)
            .field("unknown_word_penalty", &self.unknown_word_penalty)
            .finish_non_exhaustive()
    }
}

impl LevelClassifier {
    pub fn new(scorer: Arc<dyn LexicalScorer>, thresholds: ThresholdTable) -> Self {
        Self {
            scorer,
            thresholds,
            unknown_word_penalty: DEFAULT_UNKNOWN_WORD_PENALTY,
        }
    }

    pub fn with_unknown_word_penalty(mut self, penalty: f64) -> Self {
        self.unknown_word_penalty = penalty;
        self
    }

    pub fn thresholds(&self) -> &ThresholdTable {
        &self.thresholds
    }

    pub fn scorer(&self) -> &dyn LexicalScorer {
        self.scorer.as_ref()
    }

    /// Level of a sentence in the given source language.
    pub fn classify(&self, sentence: &Sentence, language: &str) -> ProficiencyLevel {
        self.score_text(sentence.text(), language).level
    }

    /// Level for an already computed mean score.
    pub fn classify_score(&self, mean: f64) -> ProficiencyLevel {
        self.thresholds.classify(mean)
    }

    /// Score every token of `text` and derive the level from the mean.
    pub fn score_text(&self, text: &str, language: &str) -> SentenceScore {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return SentenceScore::empty();
        }

        let mut total = 0.0;
        let mut min = f64::INFINITY;
        let mut unknown_count = 0;
        let mut letters = 0;

        for token in &tokens {
            let score = match self.scorer.score(token, language) {
                Some(score) => score,
                None => {
                    unknown_count += 1;
                    self.unknown_word_penalty
                }
            };
            total += score;
            min = min.min(score);
            letters += token.chars().count();
        }

        let count = tokens.len() as f64;
        let mean = total / count;

        SentenceScore {
            level: self.classify_score(mean),
            mean: Some(mean),
            min: Some(min),
            token_count: tokens.len(),
            unknown_count,
            avg_word_length: letters as f64 / count,
        }
    }
}
