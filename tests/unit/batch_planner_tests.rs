/*!
 * Tests for batch planning over classified documents
 */

use std::collections::HashMap;

use mlbooks::difficulty::{ProficiencyLevel, SentenceSelector};
use mlbooks::document::DocumentTree;
use mlbooks::translation::{BatchPlanner, EntryTag, TranslationBatch};

use crate::common;

fn selected_book(user_level: ProficiencyLevel) -> DocumentTree {
    let mut document = common::mixed_book();
    SentenceSelector::new(common::classifier()).select(&mut document, user_level, "en");
    document
}

fn check_plan(document: &DocumentTree, batches: &[TranslationBatch], max_batch_size: usize, context_window: usize) {
    let mut translate_seen: HashMap<usize, usize> = HashMap::new();
    let mut expected_id = 1;

    for (position, batch) in batches.iter().enumerate() {
        assert_eq!(batch.index, position);
        assert!(!batch.is_empty());
        assert!(batch.len() <= max_batch_size, "batch {} holds {} entries", batch.index, batch.len());
        assert!(batch.translate_count() > 0);

        for window in batch.entries.windows(2) {
            assert!(window[0].location < window[1].location, "entries out of document order");
        }

        for entry in &batch.entries {
            assert_eq!(entry.reference_id, expected_id);
            expected_id += 1;

            let sentence = document.sentence(entry.location).unwrap();
            assert_eq!(sentence.id(), entry.sentence_id);
            assert_eq!(sentence.text(), entry.text);

            match entry.tag {
                EntryTag::Translate => {
                    assert!(sentence.should_translate());
                    *translate_seen.entry(entry.sentence_id).or_insert(0) += 1;
                }
                EntryTag::Context => {
                    let anchored = batch.translate_entries().any(|target| {
                        target.location.chapter == entry.location.chapter
                            && target.location.paragraph == entry.location.paragraph
                            && target.location.sentence.abs_diff(entry.location.sentence) <= context_window
                    });
                    assert!(anchored, "context entry {} has no nearby target", entry.reference_id);
                }
            }
        }
    }

    for sentence in document.sentences().filter(|s| s.should_translate()) {
        assert_eq!(
            translate_seen.get(&sentence.id()),
            Some(&1),
            "sentence {} must be requested exactly once",
            sentence.id()
        );
    }
}

/// Test the planning invariants over a grid of batch sizes and windows
#[test]
fn test_plan_overSizesAndWindows_shouldUpholdInvariants() {
    for level in [ProficiencyLevel::A1, ProficiencyLevel::B1, ProficiencyLevel::C2Plus] {
        let document = selected_book(level);
        for max_batch_size in 1..=6 {
            for context_window in 0..=3 {
                let batches = BatchPlanner::new(max_batch_size, context_window)
                    .unwrap()
                    .plan(&document);
                check_plan(&document, &batches, max_batch_size, context_window);
            }
        }
    }
}

/// Test that context never leaks across paragraph boundaries
#[test]
fn test_plan_contextWindow_shouldStayInsideParagraph() {
    let document = selected_book(ProficiencyLevel::B1);

    let batches = BatchPlanner::new(40, 5).unwrap().plan(&document);

    assert_eq!(batches.len(), 1);
    // "..." sits in the same paragraph as the selected "The dog ran home."
    let context: Vec<&str> = batches[0].context_entries().map(|e| e.text.as_str()).collect();
    assert_eq!(
        context,
        vec!["Harbour lantern meadow.", "...", "Lantern meadow harbour.", "Meadow harbour."]
    );
    assert_eq!(batches[0].translate_count(), 6);
}

/// Test that a document with nothing selected plans no batches
#[test]
fn test_plan_nothingSelected_shouldBeEmpty() {
    let mut document = common::single_paragraph(&["Harbour lantern meadow.", "..."]);
    SentenceSelector::new(common::classifier()).select(&mut document, ProficiencyLevel::B2, "en");

    assert!(BatchPlanner::new(10, 2).unwrap().plan(&document).is_empty());
}

/// Test that sentences already translated are not planned again
#[test]
fn test_plan_afterPartialTranslation_shouldSkipTranslated() {
    let mut document = selected_book(ProficiencyLevel::B1);
    for sentence in document.sentences_mut().filter(|s| s.should_translate()).take(4) {
        sentence.record_translation("done");
    }

    let batches = BatchPlanner::new(10, 0).unwrap().plan(&document);

    let planned: usize = batches.iter().map(TranslationBatch::translate_count).sum();
    assert_eq!(planned, 2);
}

/// Test that planning is a pure function of the document
#[test]
fn test_plan_twice_shouldBeIdentical() {
    let document = selected_book(ProficiencyLevel::B1);
    let planner = BatchPlanner::new(3, 1).unwrap();

    assert_eq!(planner.plan(&document), planner.plan(&document));
}

/// Test the lookup helpers of a batch
#[test]
fn test_batch_entryAndRange_shouldFindByReferenceId() {
    let document = selected_book(ProficiencyLevel::B1);
    let batches = BatchPlanner::new(4, 1).unwrap().plan(&document);
    let second = &batches[1];

    let range = second.reference_range().unwrap();
    assert_eq!(*range.start(), second.entries[0].reference_id);
    assert_eq!(*range.end(), second.entries.last().unwrap().reference_id);
    assert!(second.entry(*range.start()).is_some());
    assert!(second.entry(1).is_none());
}

/// Test that a zero batch size is rejected
#[test]
fn test_new_zeroBatchSize_shouldFail() {
    assert!(BatchPlanner::new(0, 2).is_err());
    let planner = BatchPlanner::new(1, 2).unwrap();
    assert_eq!(planner.max_batch_size(), 1);
    assert_eq!(planner.context_window(), 2);
}
