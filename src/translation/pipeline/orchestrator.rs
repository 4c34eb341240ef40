/*!
 * Pipeline orchestrator for selective book translation.
 *
 * One run walks a single document through:
 * 1. Selection: classify every sentence and mark the ones to translate
 * 2. Batching: group selected sentences with their context
 * 3. Translation: send batches concurrently, up to `max_in_flight`
 * 4. Reconciliation: write each response back as it arrives
 *
 * A failed batch never stops the run; its sentences stay in the original
 * language and are counted as kept due to failure.
 */

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use futures::future;
use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use crate::difficulty::{LevelClassifier, ProficiencyLevel, SelectionSummary, SentenceSelector};
use crate::document::{DocumentTree, SentenceDisposition};
use crate::errors::{ConfigurationError, PipelineError};
use crate::language_utils;
use crate::providers::Provider;
use crate::translation::batch::{BatchPlanner, TranslationBatch};
use crate::translation::prompts::PromptTemplate;
use crate::translation::reconcile::{ReconciliationReport, ResponseReconciler};
use crate::translation::requester::{RetryPolicy, TranslationRequester};

/// Configuration for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Language of the book
    pub source_language: String,

    /// Language translations are written in
    pub target_language: String,

    /// Sentences at or below this level are translated
    pub user_level: ProficiencyLevel,

    /// Maximum number of entries (context included) per batch
    pub max_batch_size: usize,

    /// Neighbouring sentences sent as context on each side
    pub context_window: usize,

    /// Batches allowed in flight at once
    pub max_in_flight: usize,

    pub retry: RetryPolicy,

    /// Timeout for a single service call
    pub request_timeout: Duration,

    /// Replacement for the default system prompt
    pub system_prompt: Option<String>,

    /// Extra guidance appended to every request
    pub custom_instructions: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            user_level: ProficiencyLevel::B1,
            max_batch_size: 40,
            context_window: 2,
            max_in_flight: 3,
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
            system_prompt: None,
            custom_instructions: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(source_language: &str, target_language: &str, user_level: ProficiencyLevel) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: target_language.to_string(),
            user_level,
            ..Default::default()
        }
    }

    pub fn with_batching(mut self, max_batch_size: usize, context_window: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self.context_window = context_window;
        self
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt;
        self
    }

    pub fn with_custom_instructions(mut self, instructions: Option<String>) -> Self {
        self.custom_instructions = instructions;
        self
    }

    /// Reject settings that would make the run meaningless.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for (field, code) in [
            ("source_language", &self.source_language),
            ("target_language", &self.target_language),
        ] {
            if !language_utils::is_valid_language_code(code) {
                return Err(ConfigurationError::invalid_value(
                    field,
                    format!("'{}' is not an ISO 639 language code", code),
                ));
            }
        }
        if language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(ConfigurationError::UnsupportedLanguagePair {
                source_language: self.source_language.clone(),
                target_language: self.target_language.clone(),
                reason: "source and target are the same language".to_string(),
            });
        }
        if self.max_batch_size == 0 {
            return Err(ConfigurationError::invalid_value("max_batch_size", "must be at least 1"));
        }
        if self.max_in_flight == 0 {
            return Err(ConfigurationError::invalid_value("max_in_flight", "must be at least 1"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigurationError::invalid_value("request_timeout", "must be positive"));
        }
        self.retry.validate()
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PipelineState {
    Idle,
    Selecting,
    Batching,
    /// Batch with this index was just dispatched
    Translating(usize),
    /// Response of this batch is being written back
    Reconciling(usize),
    Completed,
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Selecting => write!(f, "selecting"),
            Self::Batching => write!(f, "batching"),
            Self::Translating(i) => write!(f, "translating batch {}", i),
            Self::Reconciling(i) => write!(f, "reconciling batch {}", i),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Terminal statistics of a run.
///
/// The three sentence counters always add up to `total_sentences`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineStats {
    /// Identifier used in the run's log lines
    pub run_id: String,
    pub total_sentences: usize,
    pub translated: usize,
    pub kept_by_design: usize,
    pub kept_due_to_failure: usize,
    pub batches_total: usize,
    pub batches_succeeded: usize,
    pub batches_failed: usize,
    /// Batches never sent because the run was cancelled
    pub batches_skipped: usize,
    pub selection: SelectionSummary,
    /// Reconciliation counts summed over all answered batches
    pub reconciliation: ReconciliationReport,
    /// One message per failed batch
    pub failures: Vec<String>,
    pub elapsed_ms: u64,
}

impl PipelineStats {
    /// Recount the sentence outcomes from the document.
    pub fn tally(&mut self, document: &DocumentTree) {
        self.total_sentences = 0;
        self.translated = 0;
        self.kept_by_design = 0;
        self.kept_due_to_failure = 0;

        for sentence in document.sentences() {
            self.total_sentences += 1;
            match sentence.disposition() {
                SentenceDisposition::KeptByDesign => self.kept_by_design += 1,
                SentenceDisposition::Translated => self.translated += 1,
                SentenceDisposition::KeptDueToFailure => self.kept_due_to_failure += 1,
            }
        }
    }

    /// Sum of the three outcome counters
    pub fn accounted(&self) -> usize {
        self.translated + self.kept_by_design + self.kept_due_to_failure
    }

    pub fn translation_percentage(&self) -> f64 {
        if self.total_sentences == 0 {
            0.0
        } else {
            self.translated as f64 / self.total_sentences as f64 * 100.0
        }
    }

    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "{} sentence(s): {} translated, {} kept by design, {} kept after failures | batches: {} ok, {} failed, {} skipped | {:.2}s",
            self.total_sentences,
            self.translated,
            self.kept_by_design,
            self.kept_due_to_failure,
            self.batches_succeeded,
            self.batches_failed,
            self.batches_skipped,
            self.elapsed_ms as f64 / 1000.0
        )
    }
}

/// Cooperative stop signal, checked before every batch is dispatched.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs the selection and translation pipeline over one document.
#[derive(Debug)]
pub struct PipelineOrchestrator {
    config: PipelineConfig,
    selector: SentenceSelector,
    /// Absent on an analysis-only orchestrator
    requester: Option<TranslationRequester>,
    reconciler: ResponseReconciler,
    state: Arc<Mutex<PipelineState>>,
    /// Statistics of the current run, republished after every batch
    progress: Arc<Mutex<PipelineStats>>,
    cancellation: CancellationFlag,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, classifier: LevelClassifier, provider: Arc<dyn Provider>) -> Self {
        let template = config
            .system_prompt
            .as_deref()
            .map(PromptTemplate::new)
            .unwrap_or_default();
        let requester = TranslationRequester::new(provider, config.retry.clone(), config.request_timeout)
            .with_template(template)
            .with_custom_instructions(config.custom_instructions.clone());

        Self {
            requester: Some(requester),
            ..Self::for_analysis(config, classifier)
        }
    }

    /// Orchestrator that can only `analyze`; `run` fails without a provider.
    pub fn for_analysis(config: PipelineConfig, classifier: LevelClassifier) -> Self {
        Self {
            config,
            selector: SentenceSelector::new(classifier),
            requester: None,
            reconciler: ResponseReconciler::new(),
            state: Arc::new(Mutex::new(PipelineState::Idle)),
            progress: Arc::new(Mutex::new(PipelineStats::default())),
            cancellation: CancellationFlag::new(),
        }
    }

    /// Use an existing flag, e.g. one shared with a signal handler
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle that stops the run before its next batch
    pub fn cancellation_flag(&self) -> CancellationFlag {
        self.cancellation.clone()
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    fn set_state(&self, state: PipelineState) {
        *self.state.lock() = state;
    }

    /// Statistics of the latest run as of its last reconciled batch.
    ///
    /// Stays readable when the `run` future is dropped mid-flight; the
    /// sentence counters add up to `total_sentences` at every point.
    pub fn progress(&self) -> PipelineStats {
        self.progress.lock().clone()
    }

    fn publish(&self, stats: &PipelineStats) {
        *self.progress.lock() = stats.clone();
    }

    /// Everything that must hold before the document is touched.
    fn prepare(&self, document: &DocumentTree) -> Result<BatchPlanner, PipelineError> {
        self.config.validate()?;
        self.selector.classifier().thresholds().validate()?;

        if !self
            .selector
            .classifier()
            .scorer()
            .supports_language(&self.config.source_language)
        {
            return Err(ConfigurationError::UnsupportedLanguagePair {
                source_language: self.config.source_language.clone(),
                target_language: self.config.target_language.clone(),
                reason: "no frequency data for the source language".to_string(),
            }
            .into());
        }

        document.validate()?;
        Ok(BatchPlanner::new(self.config.max_batch_size, self.config.context_window)?)
    }

    /// Classify the document without translating anything.
    pub fn analyze(&self, document: &mut DocumentTree) -> Result<SelectionSummary, PipelineError> {
        if let Err(e) = self.prepare(document) {
            self.set_state(PipelineState::Failed);
            return Err(e);
        }
        self.set_state(PipelineState::Selecting);
        let summary = self
            .selector
            .select(document, self.config.user_level, &self.config.source_language);
        self.set_state(PipelineState::Completed);
        Ok(summary)
    }

    /// Run the whole pipeline, mutating `document` in place.
    ///
    /// Returns the statistics of a completed run. Cancellation returns
    /// `PipelineError::Cancelled` carrying the statistics so far; every
    /// translation already received stays in the document. Intermediate
    /// statistics are available through `progress`.
    pub async fn run(&self, document: &mut DocumentTree) -> Result<PipelineStats, PipelineError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        let prepared = self.prepare(document).and_then(|planner| match &self.requester {
            Some(requester) => Ok((planner, requester)),
            None => Err(ConfigurationError::invalid_value("provider", "no translation provider attached").into()),
        });
        let (planner, requester) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                self.set_state(PipelineState::Failed);
                return Err(e);
            }
        };

        info!(
            "[{}] Translating '{}' {} -> {} for level {}",
            run_id, document.title, self.config.source_language, self.config.target_language, self.config.user_level
        );

        self.set_state(PipelineState::Selecting);
        let selection = self
            .selector
            .select(document, self.config.user_level, &self.config.source_language);
        info!(
            "[{}] {} of {} sentence(s) selected for translation ({:.1}%)",
            run_id,
            selection.sentences_to_translate,
            selection.total_sentences,
            selection.translation_percentage()
        );

        self.set_state(PipelineState::Batching);
        let batches = planner.plan(document);
        info!(
            "[{}] {} batch(es), up to {} in flight",
            run_id,
            batches.len(),
            self.config.max_in_flight
        );

        let mut stats = PipelineStats {
            run_id: run_id.clone(),
            batches_total: batches.len(),
            selection,
            ..Default::default()
        };
        stats.tally(document);
        self.publish(&stats);

        self.translate_batches(requester, &batches, document, &mut stats, started)
            .await;

        stats.batches_skipped = stats.batches_total - stats.batches_succeeded - stats.batches_failed;
        stats.tally(document);
        stats.elapsed_ms = started.elapsed().as_millis() as u64;
        self.publish(&stats);

        if stats.batches_skipped > 0 {
            self.set_state(PipelineState::Failed);
            warn!(
                "[{}] Cancelled with {} batch(es) not sent: {}",
                run_id,
                stats.batches_skipped,
                stats.summary()
            );
            return Err(PipelineError::Cancelled { stats: Box::new(stats) });
        }

        self.set_state(PipelineState::Completed);
        info!("[{}] Completed: {}", run_id, stats.summary());
        Ok(stats)
    }

    /// Dispatch batches concurrently and reconcile each one as it arrives.
    async fn translate_batches(
        &self,
        requester: &TranslationRequester,
        batches: &[TranslationBatch],
        document: &mut DocumentTree,
        stats: &mut PipelineStats,
        started: Instant,
    ) {
        let source = self.config.source_language.as_str();
        let target = self.config.target_language.as_str();
        let cancellation = self.cancellation.clone();

        let mut responses = stream::iter(batches)
            .take_while(move |_| future::ready(!cancellation.is_cancelled()))
            .map(|batch| {
                self.set_state(PipelineState::Translating(batch.index));
                async move { (batch, requester.request(batch, source, target).await) }
            })
            .buffer_unordered(self.config.max_in_flight);

        while let Some((batch, result)) = responses.next().await {
            self.set_state(PipelineState::Reconciling(batch.index));
            match result {
                Ok(raw) => {
                    let report = self.reconciler.reconcile(batch, &raw, document);
                    stats.batches_succeeded += 1;
                    stats.reconciliation.merge(&report);
                }
                Err(e) => {
                    warn!(
                        "[{}] {}; {} sentence(s) stay untranslated",
                        stats.run_id,
                        e,
                        batch.translate_count()
                    );
                    stats.batches_failed += 1;
                    stats.failures.push(e.to_string());
                }
            }
            stats.tally(document);
            stats.elapsed_ms = started.elapsed().as_millis() as u64;
            self.publish(stats);
            debug!(
                "[{}] {}/{} batch(es) done, {} sentence(s) translated",
                stats.run_id,
                stats.batches_succeeded + stats.batches_failed,
                stats.batches_total,
                stats.translated
            );
        }
    }
}
