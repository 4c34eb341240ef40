/*!
 * Marks which sentences get translated for a given reader.
 *
 * Sentences at or below the reader's level are translated into their native
 * language; harder ones stay in the original so the reader meets them head on.
 */

use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::document::DocumentTree;

use super::classifier::LevelClassifier;
use super::level::ProficiencyLevel;

/// Aggregate view of one selection pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionSummary {
    pub total_sentences: usize,
    pub sentences_to_translate: usize,

    /// Sentences without any word token, always kept
    pub empty_sentences: usize,

    /// Sentence count per level
    pub level_distribution: BTreeMap<ProficiencyLevel, usize>,

    /// Mean of all sentence scores, ignoring empty sentences
    pub average_difficulty: Option<f64>,
}

impl SelectionSummary {
    pub fn sentences_to_keep(&self) -> usize {
        self.total_sentences - self.sentences_to_translate
    }

    pub fn translation_percentage(&self) -> f64 {
        if self.total_sentences == 0 {
            return 0.0;
        }
        self.sentences_to_translate as f64 / self.total_sentences as f64 * 100.0
    }
}

/// Classifies every sentence of a document and sets its translate flag.
#[derive(Debug, Clone)]
pub struct SentenceSelector {
    classifier: LevelClassifier,
}

impl SentenceSelector {
    pub fn new(classifier: LevelClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &LevelClassifier {
        &self.classifier
    }

    /// Classify all sentences in place.
    ///
    /// `should_translate` is `level <= user_level`, except that sentences
    /// without word tokens are forced to A1 and never translated.
    pub fn select(
        &self,
        document: &mut DocumentTree,
        user_level: ProficiencyLevel,
        language: &str,
    ) -> SelectionSummary {
        let mut summary = SelectionSummary {
            level_distribution: ProficiencyLevel::ALL.into_iter().map(|l| (l, 0)).collect(),
            ..Default::default()
        };
        let mut score_total = 0.0;
        let mut scored = 0usize;

        for sentence in document.sentences_mut() {
            let score = self.classifier.score_text(sentence.text(), language);
            let should_translate = !score.is_empty() && score.level <= user_level;

            sentence.apply_classification(score.mean, score.level, should_translate);

            summary.total_sentences += 1;
            *summary.level_distribution.entry(score.level).or_insert(0) += 1;
            if should_translate {
                summary.sentences_to_translate += 1;
            }
            match score.mean {
                Some(mean) => {
                    score_total += mean;
                    scored += 1;
                }
                None => summary.empty_sentences += 1,
            }
        }

        if scored > 0 {
            summary.average_difficulty = Some(score_total / scored as f64);
        }

        debug!(
            "Selected {} of {} sentence(s) for translation at level {}",
            summary.sentences_to_translate, summary.total_sentences, user_level
        );
        summary
    }
}
