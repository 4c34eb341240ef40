/*!
 * Common test utilities for the mlbooks test suite
 */

use anyhow::Result;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use mlbooks::difficulty::{LevelClassifier, LexicalScorer, ThresholdTable};
use mlbooks::document::DocumentTree;

/// Words scoring 6.5, classified A1 on their own
pub const EASY_WORDS: [&str; 8] = ["the", "cat", "sat", "on", "mat", "dog", "ran", "home"];

/// Words scoring 5.2, so a sentence made of them is B1
pub const MEDIUM_WORDS: [&str; 3] = ["river", "garden", "window"];

/// Words scoring 4.2, so a sentence made of them is C1
pub const HARD_WORDS: [&str; 3] = ["harbour", "lantern", "meadow"];

/// Lexicon with a fixed score per word, English only.
#[derive(Debug, Clone)]
pub struct StaticLexicon {
    scores: HashMap<String, f64>,
}

impl StaticLexicon {
    pub fn new() -> Self {
        let mut scores = HashMap::new();
        for word in EASY_WORDS {
            scores.insert(word.to_string(), 6.5);
        }
        for word in MEDIUM_WORDS {
            scores.insert(word.to_string(), 5.2);
        }
        for word in HARD_WORDS {
            scores.insert(word.to_string(), 4.2);
        }
        Self { scores }
    }
}

impl LexicalScorer for StaticLexicon {
    fn score(&self, word: &str, language: &str) -> Option<f64> {
        if language != "en" {
            return None;
        }
        self.scores.get(&word.to_lowercase()).copied()
    }

    fn supports_language(&self, language: &str) -> bool {
        language == "en"
    }
}

/// Classifier over `StaticLexicon` with the default thresholds
pub fn classifier() -> LevelClassifier {
    LevelClassifier::new(Arc::new(StaticLexicon::new()), ThresholdTable::default())
}

/// Route library logs through env_logger; safe to call from every test
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One chapter holding one paragraph per sentence
pub fn one_sentence_per_paragraph(sentences: &[&str]) -> DocumentTree {
    let paragraphs = sentences.iter().map(|s| vec![*s]).collect();
    DocumentTree::from_paragraphs("Test Book", "en", vec![paragraphs])
}

/// One chapter with a single paragraph holding every sentence
pub fn single_paragraph(sentences: &[&str]) -> DocumentTree {
    DocumentTree::from_paragraphs("Test Book", "en", vec![vec![sentences.to_vec()]])
}

/// A small book mixing easy, medium, hard and empty sentences over two chapters
pub fn mixed_book() -> DocumentTree {
    DocumentTree::from_paragraphs(
        "Mixed Book",
        "en",
        vec![
            vec![
                vec!["The cat sat.", "River garden window.", "Harbour lantern meadow."],
                vec!["The dog ran home.", "..."],
            ],
            vec![
                vec!["Lantern meadow harbour.", "The cat ran."],
                vec!["Garden river.", "On the mat.", "Meadow harbour."],
            ],
        ],
    )
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}
