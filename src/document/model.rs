/*!
 * Core document model types.
 *
 * The tree is the sole owner of every node. Pipeline stages address
 * sentences through `SentenceLocation` values instead of holding references
 * into the tree, so batches can be planned, sent and reconciled without
 * aliasing the document.
 */

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::difficulty::ProficiencyLevel;
use crate::errors::PipelineError;

/// Complete book as produced by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    /// Book title
    pub title: String,

    /// Author, when the package declares one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Language of the original text (ISO code)
    pub language: String,

    /// Chapters in reading order
    pub chapters: Vec<Chapter>,
}

/// A chapter: ordered paragraphs plus the identity of the file it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Position of the chapter in the book
    pub index: usize,

    /// Chapter title
    #[serde(default)]
    pub title: String,

    /// Source file reference inside the package
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Paragraphs in reading order
    pub paragraphs: Vec<Paragraph>,
}

/// A paragraph: ordered sentences plus opaque original markup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Position of the paragraph in its chapter
    pub index: usize,

    /// Original markup, carried through untouched
    #[serde(default)]
    pub markup: String,

    /// Sentences in reading order
    pub sentences: Vec<Sentence>,
}

/// A single sentence with its classification and translation state.
///
/// Text, id and position are fixed at ingestion. The remaining fields are
/// written by the selector and reconciler only through the methods below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    id: usize,
    text: String,
    chapter_index: usize,
    paragraph_index: usize,

    #[serde(default)]
    difficulty_score: Option<f64>,

    #[serde(default)]
    level: Option<ProficiencyLevel>,

    #[serde(default)]
    should_translate: bool,

    #[serde(default)]
    translated_text: Option<String>,
}

/// Address of a sentence inside a `DocumentTree` (vector positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SentenceLocation {
    pub chapter: usize,
    pub paragraph: usize,
    pub sentence: usize,
}

/// Final outcome of a sentence after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentenceDisposition {
    /// At or above the reader's level, or empty: left in the original language
    KeptByDesign,
    /// Selected and translated
    Translated,
    /// Selected, but no translation came back
    KeptDueToFailure,
}

impl Sentence {
    pub fn new(id: usize, text: impl Into<String>, chapter_index: usize, paragraph_index: usize) -> Self {
        Self {
            id,
            text: text.into(),
            chapter_index,
            paragraph_index,
            difficulty_score: None,
            level: None,
            should_translate: false,
            translated_text: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn chapter_index(&self) -> usize {
        self.chapter_index
    }

    pub fn paragraph_index(&self) -> usize {
        self.paragraph_index
    }

    pub fn difficulty_score(&self) -> Option<f64> {
        self.difficulty_score
    }

    pub fn level(&self) -> Option<ProficiencyLevel> {
        self.level
    }

    pub fn should_translate(&self) -> bool {
        self.should_translate
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.translated_text.as_deref()
    }

    pub fn is_translated(&self) -> bool {
        self.translated_text.is_some()
    }

    /// Translated text when present, otherwise the original.
    pub fn effective_text(&self) -> &str {
        self.translated_text.as_deref().unwrap_or(&self.text)
    }

    /// Store the classifier's verdict.
    ///
    /// A sentence that is no longer selected cannot keep a translation.
    pub fn apply_classification(
        &mut self,
        difficulty_score: Option<f64>,
        level: ProficiencyLevel,
        should_translate: bool,
    ) {
        self.difficulty_score = difficulty_score;
        self.level = Some(level);
        self.should_translate = should_translate;
        if !should_translate {
            self.translated_text = None;
        }
    }

    /// Record a translation for a selected sentence.
    ///
    /// Returns `false` without touching the sentence when it is not selected
    /// or already carries a translation.
    pub fn record_translation(&mut self, translated: impl Into<String>) -> bool {
        if !self.should_translate || self.translated_text.is_some() {
            return false;
        }
        self.translated_text = Some(translated.into());
        true
    }

    /// Whether the sentence still needs a translation request.
    pub fn awaiting_translation(&self) -> bool {
        self.should_translate && self.translated_text.is_none()
    }

    pub fn disposition(&self) -> SentenceDisposition {
        match (self.should_translate, self.translated_text.is_some()) {
            (false, _) => SentenceDisposition::KeptByDesign,
            (true, true) => SentenceDisposition::Translated,
            (true, false) => SentenceDisposition::KeptDueToFailure,
        }
    }
}

impl Paragraph {
    pub fn new(index: usize, markup: impl Into<String>, sentences: Vec<Sentence>) -> Self {
        Self {
            index,
            markup: markup.into(),
            sentences,
        }
    }

    /// Paragraph text with translations applied, sentences joined by a space.
    pub fn effective_text(&self) -> String {
        self.sentences
            .iter()
            .map(Sentence::effective_text)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn translated_count(&self) -> usize {
        self.sentences.iter().filter(|s| s.is_translated()).count()
    }
}

impl Chapter {
    pub fn new(index: usize, title: impl Into<String>, paragraphs: Vec<Paragraph>) -> Self {
        Self {
            index,
            title: title.into(),
            file_name: None,
            paragraphs,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn sentence_count(&self) -> usize {
        self.paragraphs.iter().map(|p| p.sentences.len()).sum()
    }

    pub fn translated_count(&self) -> usize {
        self.paragraphs.iter().map(Paragraph::translated_count).sum()
    }

    /// Share of translated sentences, in percent.
    pub fn translation_percentage(&self) -> f64 {
        percentage(self.translated_count(), self.sentence_count())
    }
}

impl DocumentTree {
    pub fn new(title: impl Into<String>, language: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        Self {
            title: title.into(),
            author: None,
            language: language.into(),
            chapters,
        }
    }

    /// Build a tree from plain text, one vector per chapter holding one
    /// vector of sentences per paragraph. Ids are assigned in reading order
    /// starting at 1.
    pub fn from_paragraphs(
        title: impl Into<String>,
        language: impl Into<String>,
        chapters: Vec<Vec<Vec<&str>>>,
    ) -> Self {
        let mut next_id = 1;
        let chapters = chapters
            .into_iter()
            .enumerate()
            .map(|(chapter_index, paragraphs)| {
                let paragraphs = paragraphs
                    .into_iter()
                    .enumerate()
                    .map(|(paragraph_index, sentences)| {
                        let sentences = sentences
                            .into_iter()
                            .map(|text| {
                                let sentence = Sentence::new(next_id, text, chapter_index, paragraph_index);
                                next_id += 1;
                                sentence
                            })
                            .collect();
                        Paragraph::new(paragraph_index, "", sentences)
                    })
                    .collect();
                Chapter::new(chapter_index, format!("Chapter {}", chapter_index + 1), paragraphs)
            })
            .collect();

        Self::new(title, language, chapters)
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// All sentences in reading order.
    pub fn sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.chapters
            .iter()
            .flat_map(|c| c.paragraphs.iter())
            .flat_map(|p| p.sentences.iter())
    }

    pub fn sentences_mut(&mut self) -> impl Iterator<Item = &mut Sentence> {
        self.chapters
            .iter_mut()
            .flat_map(|c| c.paragraphs.iter_mut())
            .flat_map(|p| p.sentences.iter_mut())
    }

    /// All sentences in reading order, paired with their location.
    pub fn located_sentences(&self) -> impl Iterator<Item = (SentenceLocation, &Sentence)> {
        self.chapters.iter().enumerate().flat_map(|(ci, chapter)| {
            chapter.paragraphs.iter().enumerate().flat_map(move |(pi, paragraph)| {
                paragraph.sentences.iter().enumerate().map(move |(si, sentence)| {
                    (
                        SentenceLocation {
                            chapter: ci,
                            paragraph: pi,
                            sentence: si,
                        },
                        sentence,
                    )
                })
            })
        })
    }

    pub fn sentence(&self, location: SentenceLocation) -> Option<&Sentence> {
        self.chapters
            .get(location.chapter)?
            .paragraphs
            .get(location.paragraph)?
            .sentences
            .get(location.sentence)
    }

    pub fn sentence_mut(&mut self, location: SentenceLocation) -> Option<&mut Sentence> {
        self.chapters
            .get_mut(location.chapter)?
            .paragraphs
            .get_mut(location.paragraph)?
            .sentences
            .get_mut(location.sentence)
    }

    pub fn sentence_count(&self) -> usize {
        self.chapters.iter().map(Chapter::sentence_count).sum()
    }

    pub fn translated_count(&self) -> usize {
        self.chapters.iter().map(Chapter::translated_count).sum()
    }

    pub fn translation_percentage(&self) -> f64 {
        percentage(self.translated_count(), self.sentence_count())
    }

    /// Check the structural contract ingestion must uphold: unique sentence
    /// ids and index fields that match the sentence's position in the tree.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = HashSet::new();
        for (location, sentence) in self.located_sentences() {
            if !seen.insert(sentence.id) {
                return Err(PipelineError::InvalidDocument(format!(
                    "duplicate sentence id {}",
                    sentence.id
                )));
            }
            if sentence.chapter_index != location.chapter
                || sentence.paragraph_index != location.paragraph
            {
                return Err(PipelineError::InvalidDocument(format!(
                    "sentence {} claims chapter {} paragraph {} but sits at chapter {} paragraph {}",
                    sentence.id,
                    sentence.chapter_index,
                    sentence.paragraph_index,
                    location.chapter,
                    location.paragraph
                )));
            }
        }
        Ok(())
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}
