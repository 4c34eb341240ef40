/*!
 * Batch planning.
 *
 * Selected sentences are grouped into bounded batches for the translation
 * service. Each selected sentence travels with up to `context_window`
 * neighbours from its own paragraph, tagged as context so the model sees the
 * surrounding prose without being asked to translate it.
 */

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;

use crate::document::{DocumentTree, SentenceLocation};
use crate::errors::ConfigurationError;

/// Role of an entry inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryTag {
    /// Shown to the model for reference only
    Context,
    /// Must come back translated
    Translate,
}

impl fmt::Display for EntryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Context => f.write_str("CONTEXT"),
            Self::Translate => f.write_str("TRANSLATE"),
        }
    }
}

/// One sentence inside a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// Document-wide unique id used on the wire
    pub reference_id: u64,
    pub tag: EntryTag,
    pub text: String,
    /// Stable id of the sentence in the document
    pub sentence_id: usize,
    pub location: SentenceLocation,
}

/// An ordered group of entries sent in a single request.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationBatch {
    /// Position of the batch in the plan
    pub index: usize,
    /// Entries in document order
    pub entries: Vec<BatchEntry>,
}

impl TranslationBatch {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn translate_entries(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.tag == EntryTag::Translate)
    }

    pub fn context_entries(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| e.tag == EntryTag::Context)
    }

    pub fn translate_count(&self) -> usize {
        self.translate_entries().count()
    }

    /// First and last reference id in the batch.
    pub fn reference_range(&self) -> Option<RangeInclusive<u64>> {
        let first = self.entries.first()?.reference_id;
        let last = self.entries.last()?.reference_id;
        Some(first..=last)
    }

    pub fn entry(&self, reference_id: u64) -> Option<&BatchEntry> {
        self.entries
            .binary_search_by_key(&reference_id, |e| e.reference_id)
            .ok()
            .map(|position| &self.entries[position])
    }
}

/// Splits a document's selected sentences into batches.
#[derive(Debug, Clone, Copy)]
pub struct BatchPlanner {
    max_batch_size: usize,
    context_window: usize,
}

impl BatchPlanner {
    pub fn new(max_batch_size: usize, context_window: usize) -> Result<Self, ConfigurationError> {
        if max_batch_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "max_batch_size",
                "a batch must hold at least one entry",
            ));
        }
        Ok(Self {
            max_batch_size,
            context_window,
        })
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn context_window(&self) -> usize {
        self.context_window
    }

    /// Plan batches for every sentence still awaiting translation.
    ///
    /// Batches are filled greedily in reading order. Within a batch every
    /// sentence appears at most once, as TRANSLATE if any entry asks for it.
    /// The same context sentence may show up again in the next batch when a
    /// paragraph is split. Reference ids increase by one per emitted entry
    /// across the whole plan.
    pub fn plan(&self, document: &DocumentTree) -> Vec<TranslationBatch> {
        let mut builder = PlanBuilder::new(document);

        for (ci, chapter) in document.chapters.iter().enumerate() {
            for (pi, paragraph) in chapter.paragraphs.iter().enumerate() {
                let len = paragraph.sentences.len();
                for (si, sentence) in paragraph.sentences.iter().enumerate() {
                    if !sentence.awaiting_translation() {
                        continue;
                    }

                    let unit: Vec<(SentenceLocation, EntryTag)> = self
                        .unit_span(len, si)
                        .map(|i| {
                            let location = SentenceLocation {
                                chapter: ci,
                                paragraph: pi,
                                sentence: i,
                            };
                            let tag = if i == si {
                                EntryTag::Translate
                            } else {
                                EntryTag::Context
                            };
                            (location, tag)
                        })
                        .collect();

                    let added = unit
                        .iter()
                        .filter(|(location, _)| !builder.pending.contains_key(location))
                        .count();
                    if !builder.pending.is_empty() && builder.pending.len() + added > self.max_batch_size {
                        builder.flush();
                    }
                    builder.add_unit(unit);
                }
            }
        }
        builder.flush();

        debug!(
            "Planned {} batch(es) with max size {} and context window {}",
            builder.batches.len(),
            self.max_batch_size,
            self.context_window
        );
        builder.batches
    }

    /// Positions covered by the target at `index` in a paragraph of `len`
    /// sentences. The window is narrowed, farthest side first, when the
    /// whole unit would not fit into one batch.
    fn unit_span(&self, len: usize, index: usize) -> RangeInclusive<usize> {
        let budget = self.max_batch_size - 1;
        let mut before = self.context_window.min(index);
        let mut after = self.context_window.min(len - 1 - index);
        while before + after > budget {
            if before >= after {
                before -= 1;
            } else {
                after -= 1;
            }
        }
        (index - before)..=(index + after)
    }
}

struct PlanBuilder<'a> {
    document: &'a DocumentTree,
    pending: BTreeMap<SentenceLocation, EntryTag>,
    batches: Vec<TranslationBatch>,
    next_reference_id: u64,
}

impl<'a> PlanBuilder<'a> {
    fn new(document: &'a DocumentTree) -> Self {
        Self {
            document,
            pending: BTreeMap::new(),
            batches: Vec::new(),
            next_reference_id: 1,
        }
    }

    fn add_unit(&mut self, unit: Vec<(SentenceLocation, EntryTag)>) {
        for (location, tag) in unit {
            match tag {
                EntryTag::Translate => {
                    self.pending.insert(location, EntryTag::Translate);
                }
                EntryTag::Context => {
                    self.pending.entry(location).or_insert(EntryTag::Context);
                }
            }
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let document = self.document;
        let mut entries = Vec::with_capacity(self.pending.len());
        for (location, tag) in std::mem::take(&mut self.pending) {
            let Some(sentence) = document.sentence(location) else {
                continue;
            };
            entries.push(BatchEntry {
                reference_id: self.next_reference_id,
                tag,
                text: sentence.text().to_string(),
                sentence_id: sentence.id(),
                location,
            });
            self.next_reference_id += 1;
        }

        self.batches.push(TranslationBatch {
            index: self.batches.len(),
            entries,
        });
    }
}
