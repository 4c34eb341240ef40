/*!
 * Integration tests for the full translation pipeline.
 *
 * Every run goes through selection, batching, the requester and
 * reconciliation against the scripted provider.
 */

use std::sync::Arc;
use std::time::Duration;

use mlbooks::difficulty::ProficiencyLevel;
use mlbooks::document::{DocumentTree, SentenceDisposition};
use mlbooks::errors::{ConfigurationError, PipelineError};
use mlbooks::providers::mock::MockProvider;
use mlbooks::translation::{
    CancellationFlag, EntryTag, PipelineConfig, PipelineOrchestrator, PipelineState, PipelineStats, RetryPolicy,
    ServiceRequest,
};

use crate::common;

const EASY_SENTENCES: [&str; 5] = ["The cat sat.", "The dog ran.", "The cat ran home.", "On the mat.", "The dog sat."];

fn config(user_level: ProficiencyLevel) -> PipelineConfig {
    PipelineConfig::new("en", "pt", user_level).with_retry(RetryPolicy::immediate(3))
}

fn orchestrator(config: PipelineConfig, provider: &MockProvider) -> PipelineOrchestrator {
    common::init_logging();
    PipelineOrchestrator::new(config, common::classifier(), Arc::new(provider.clone()))
}

fn text_of(document: &DocumentTree, id: usize) -> String {
    document
        .sentences()
        .find(|s| s.id() == id)
        .map(|s| s.effective_text().to_string())
        .unwrap_or_default()
}

fn assert_accounted(stats: &PipelineStats, document: &DocumentTree) {
    assert_eq!(stats.total_sentences, document.sentence_count());
    assert_eq!(stats.accounted(), stats.total_sentences);
    assert_eq!(stats.translated, document.translated_count());
}

/// Garble the response line of the third requested sentence
fn garble_third_line(request: &ServiceRequest) -> String {
    MockProvider::echo_response(request)
        .lines()
        .enumerate()
        .map(|(i, line)| if i == 2 { line.replacen(':', " -", 1) } else { line.to_string() })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Test the reader-level split: easier sentences translated, harder kept
#[tokio::test]
async fn test_run_userB1_shouldTranslateOnlyEasierSentences() {
    let provider = MockProvider::working();
    let pipeline = orchestrator(config(ProficiencyLevel::B1), &provider);
    let mut document = common::mixed_book();

    let stats = pipeline.run(&mut document).await.unwrap();

    assert_eq!(stats.total_sentences, 10);
    assert_eq!(stats.translated, 6);
    assert_eq!(stats.kept_by_design, 4);
    assert_eq!(stats.kept_due_to_failure, 0);
    assert_eq!(stats.batches_failed, 0);
    assert!(stats.reconciliation.is_clean());
    assert_accounted(&stats, &document);
    assert_eq!(pipeline.state(), PipelineState::Completed);

    assert_eq!(text_of(&document, 2), "[pt] River garden window.");
    assert_eq!(text_of(&document, 3), "Harbour lantern meadow.");
    assert_eq!(text_of(&document, 5), "...");
    for sentence in document.sentences() {
        if sentence.level().unwrap() > ProficiencyLevel::B1 {
            assert!(!sentence.is_translated());
        }
    }
}

/// Test that one malformed line leaves exactly that sentence untranslated
#[tokio::test]
async fn test_run_oneMalformedLine_shouldKeepOneSentence() {
    let provider = MockProvider::working().with_custom_response(garble_third_line);
    let pipeline = orchestrator(config(ProficiencyLevel::A1).with_batching(10, 0), &provider);
    let mut document = common::single_paragraph(&EASY_SENTENCES);

    let stats = pipeline.run(&mut document).await.unwrap();

    assert_eq!(stats.batches_total, 1);
    assert_eq!(stats.batches_succeeded, 1);
    assert_eq!(stats.reconciliation.matched, 4);
    assert_eq!(stats.reconciliation.malformed, 1);
    assert_eq!(stats.reconciliation.missing_ids, vec![3]);
    assert_eq!(stats.translated, 4);
    assert_eq!(stats.kept_due_to_failure, 1);
    assert_eq!(text_of(&document, 3), "The cat ran home.");
    assert_eq!(text_of(&document, 4), "[pt] On the mat.");
    assert_accounted(&stats, &document);
}

/// Test that a batch exhausting its retries does not affect the others
#[tokio::test]
async fn test_run_thirdOfFiveBatchesFailing_shouldIsolateFailure() {
    let provider = MockProvider::failing_when(|request| request.translate_ids().any(|id| id == 3));
    let pipeline = orchestrator(config(ProficiencyLevel::A1).with_batching(1, 0), &provider);
    let mut document = common::one_sentence_per_paragraph(&EASY_SENTENCES);

    let stats = pipeline.run(&mut document).await.unwrap();

    assert_eq!(stats.batches_total, 5);
    assert_eq!(stats.batches_succeeded, 4);
    assert_eq!(stats.batches_failed, 1);
    assert_eq!(stats.failures.len(), 1);
    assert!(stats.failures[0].contains("Batch 2"), "{}", stats.failures[0]);
    assert!(stats.failures[0].contains("3 attempt(s)"), "{}", stats.failures[0]);
    assert_eq!(stats.translated, 4);
    assert_eq!(stats.kept_due_to_failure, 1);
    // Four single calls plus three attempts for the failing batch
    assert_eq!(provider.request_count(), 7);

    let third = document.sentences().nth(2).unwrap();
    assert_eq!(third.disposition(), SentenceDisposition::KeptDueToFailure);
    assert_eq!(third.effective_text(), "The cat ran home.");
    assert_eq!(pipeline.state(), PipelineState::Completed);
}

/// Test cancellation after the second batch: finished work stays, the rest is skipped
#[tokio::test]
async fn test_run_cancelledAfterTwoBatches_shouldKeepFinishedWork() {
    let flag = CancellationFlag::new();
    let provider = MockProvider::working().cancel_after(2, flag.clone());
    let pipeline = orchestrator(
        config(ProficiencyLevel::A1).with_batching(1, 0).with_max_in_flight(1),
        &provider,
    )
    .with_cancellation(flag);
    let mut document = common::one_sentence_per_paragraph(&EASY_SENTENCES);

    let stats = match pipeline.run(&mut document).await {
        Err(PipelineError::Cancelled { stats }) => stats,
        other => panic!("expected a cancelled run, got {:?}", other.map(|s| s.summary())),
    };
    assert_eq!(stats.batches_succeeded, 2);
    assert_eq!(stats.batches_skipped, 3);
    assert_eq!(stats.translated, 2);
    assert_eq!(stats.kept_due_to_failure, 3);
    assert_accounted(&stats, &document);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert_eq!(text_of(&document, 1), "[pt] The cat sat.");
    assert_eq!(text_of(&document, 3), "The cat ran home.");
}

/// Test that a run cancelled before it starts sends nothing
#[tokio::test]
async fn test_run_cancelledUpFront_shouldSendNothing() {
    let provider = MockProvider::working();
    let pipeline = orchestrator(config(ProficiencyLevel::B1).with_batching(2, 1), &provider);
    pipeline.cancellation_flag().cancel();
    let mut document = common::mixed_book();

    let stats = match pipeline.run(&mut document).await {
        Err(PipelineError::Cancelled { stats }) => stats,
        other => panic!("expected a cancelled run, got {:?}", other.map(|s| s.summary())),
    };
    assert_eq!(provider.request_count(), 0);
    assert_eq!(stats.batches_skipped, stats.batches_total);
    assert_eq!(stats.translated, 0);
    assert_eq!(stats.kept_due_to_failure, 6);
    assert_accounted(&stats, &document);
}

/// Test that progress survives a run future dropped halfway through
#[tokio::test]
async fn test_progress_runDroppedMidFlight_shouldReflectFinishedBatches() {
    let provider = MockProvider::working().with_latency(Duration::from_millis(40));
    let pipeline = orchestrator(
        config(ProficiencyLevel::A1).with_batching(1, 0).with_max_in_flight(1),
        &provider,
    );
    let mut document = common::one_sentence_per_paragraph(&EASY_SENTENCES);

    let outcome = tokio::time::timeout(Duration::from_millis(110), pipeline.run(&mut document)).await;
    assert!(outcome.is_err(), "run should still be in flight");

    let progress = pipeline.progress();
    assert_eq!(progress.batches_total, 5);
    assert!(progress.batches_succeeded >= 1 && progress.batches_succeeded < 5);
    assert_eq!(progress.translated, progress.batches_succeeded);
    assert_eq!(progress.translated, document.translated_count());
    assert_eq!(progress.total_sentences, 5);
    assert_eq!(progress.accounted(), progress.total_sentences);
}

/// Test that no more than max_in_flight requests run at once
#[tokio::test]
async fn test_run_withLatency_shouldRespectMaxInFlight() {
    let sentences = ["The cat sat.", "The dog ran.", "On the mat.", "The cat ran.", "The dog sat.", "Sat home."];

    for max_in_flight in [1, 2, 4] {
        let provider = MockProvider::working().with_latency(Duration::from_millis(20));
        let pipeline = orchestrator(
            config(ProficiencyLevel::A1)
                .with_batching(1, 0)
                .with_max_in_flight(max_in_flight),
            &provider,
        );
        let mut document = common::one_sentence_per_paragraph(&sentences);

        let stats = pipeline.run(&mut document).await.unwrap();

        assert_eq!(stats.translated, 6);
        assert_eq!(provider.request_count(), 6);
        assert_eq!(provider.peak_in_flight(), max_in_flight);
    }
}

/// Test that a rejected key fails every batch once, without retries, and the run still completes
#[tokio::test]
async fn test_run_unauthorizedProvider_shouldKeepEverySelectedSentence() {
    let provider = MockProvider::unauthorized();
    let pipeline = orchestrator(config(ProficiencyLevel::B1).with_batching(3, 1), &provider);
    let mut document = common::mixed_book();

    let stats = pipeline.run(&mut document).await.unwrap();

    assert_eq!(stats.translated, 0);
    assert_eq!(stats.kept_due_to_failure, 6);
    assert_eq!(stats.batches_failed, stats.batches_total);
    assert_eq!(provider.request_count(), stats.batches_total);
    assert_accounted(&stats, &document);
}

/// Test that empty answers are retried and then count as failures
#[tokio::test]
async fn test_run_emptyResponses_shouldFailAfterRetries() {
    let provider = MockProvider::empty();
    let pipeline = orchestrator(
        PipelineConfig::new("en", "pt", ProficiencyLevel::A1)
            .with_retry(RetryPolicy::immediate(2))
            .with_batching(10, 0),
        &provider,
    );
    let mut document = common::single_paragraph(&EASY_SENTENCES);

    let stats = pipeline.run(&mut document).await.unwrap();

    assert_eq!(stats.batches_failed, 1);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(stats.kept_due_to_failure, 5);
}

/// Test that intermittent failures are absorbed by retries
#[tokio::test]
async fn test_run_intermittentProvider_shouldRecoverEveryBatch() {
    let provider = MockProvider::intermittent(2);
    let pipeline = orchestrator(
        config(ProficiencyLevel::A1).with_batching(1, 0).with_max_in_flight(1),
        &provider,
    );
    let mut document = common::one_sentence_per_paragraph(&EASY_SENTENCES);

    let stats = pipeline.run(&mut document).await.unwrap();

    assert_eq!(stats.translated, 5);
    assert_eq!(stats.batches_failed, 0);
    assert!(provider.request_count() > 5);
}

/// Test that a second run only asks for what the first one missed
#[tokio::test]
async fn test_run_secondRunAfterDroppedLines_shouldOnlyRequestMissing() {
    let mut document = common::single_paragraph(&["The cat sat.", "The dog ran.", "On the mat.", "The dog sat."]);

    let dropping = MockProvider::dropping(2);
    let first = orchestrator(config(ProficiencyLevel::A1).with_batching(10, 0), &dropping)
        .run(&mut document)
        .await
        .unwrap();
    assert_eq!(first.translated, 2);
    assert_eq!(first.reconciliation.missing_ids, vec![2, 4]);

    let working = MockProvider::working();
    let second = orchestrator(config(ProficiencyLevel::A1).with_batching(10, 0), &working)
        .run(&mut document)
        .await
        .unwrap();

    assert_eq!(second.translated, 4);
    assert_eq!(second.kept_due_to_failure, 0);
    let requested: Vec<String> = working.requests()[0].entries.iter().map(|e| e.text.clone()).collect();
    assert_eq!(requested, vec!["The dog ran.", "The dog sat."]);
    assert_eq!(text_of(&document, 1), "[pt] The cat sat.");
}

/// Test that neighbours travel as context and never come back as translations
#[tokio::test]
async fn test_run_withContextWindow_shouldSendContextEntries() {
    let provider = MockProvider::working();
    let pipeline = orchestrator(config(ProficiencyLevel::B1).with_batching(40, 1), &provider);
    let mut document = common::mixed_book();

    let stats = pipeline.run(&mut document).await.unwrap();

    let request = &provider.requests()[0];
    let context: Vec<&str> = request
        .entries
        .iter()
        .filter(|e| e.tag == EntryTag::Context)
        .map(|e| e.text.as_str())
        .collect();
    assert!(context.contains(&"Harbour lantern meadow."));
    assert!(request.prompt.contains("Harbour lantern meadow."));
    assert_eq!(stats.reconciliation.anomalous, 0);
    assert_eq!(text_of(&document, 3), "Harbour lantern meadow.");
}

/// Test the outcome counters over many readers and provider behaviours
#[tokio::test]
async fn test_run_anyProviderBehaviour_shouldAccountForEverySentence() {
    let providers = [
        MockProvider::working(),
        MockProvider::dropping(3),
        MockProvider::malformed(),
        MockProvider::failing(),
        MockProvider::intermittent(3),
    ];

    for provider in providers {
        for user_level in ProficiencyLevel::ALL {
            let pipeline = orchestrator(config(user_level).with_batching(3, 1), &provider);
            let mut document = common::mixed_book();

            let stats = pipeline.run(&mut document).await.unwrap();

            assert_accounted(&stats, &document);
            assert_eq!(stats.kept_by_design, stats.total_sentences - stats.selection.sentences_to_translate);
            assert_eq!(stats.batches_succeeded + stats.batches_failed, stats.batches_total);
            for sentence in document.sentences() {
                if sentence.level().unwrap() > user_level {
                    assert!(!sentence.is_translated());
                }
            }
        }
    }
}

/// Test that an unsupported source language stops the run before any request
#[tokio::test]
async fn test_run_unsupportedSource_shouldNotCallProvider() {
    let provider = MockProvider::working();
    let pipeline = orchestrator(PipelineConfig::new("fr", "pt", ProficiencyLevel::B1), &provider);
    let mut document = common::mixed_book();
    let original = document.clone();

    let result = pipeline.run(&mut document).await;

    assert!(matches!(
        result,
        Err(PipelineError::Configuration(ConfigurationError::UnsupportedLanguagePair { .. }))
    ));
    assert_eq!(provider.request_count(), 0);
    assert_eq!(document, original);
    assert_eq!(pipeline.state(), PipelineState::Failed);
}

/// Test that a structurally broken document is rejected
#[tokio::test]
async fn test_run_duplicateSentenceIds_shouldFail() {
    let provider = MockProvider::working();
    let pipeline = orchestrator(config(ProficiencyLevel::B1), &provider);
    let mut document = common::single_paragraph(&["The cat sat.", "The dog ran."]);
    let json = serde_json::to_string(&document)
        .unwrap()
        .replace("\"id\":2", "\"id\":1");
    document = serde_json::from_str(&json).unwrap();

    let result = pipeline.run(&mut document).await;

    assert!(matches!(result, Err(PipelineError::InvalidDocument(_))));
    assert_eq!(provider.request_count(), 0);
}
