/*!
 * Translation of selected sentences using AI providers.
 *
 * This module contains the translation half of the pipeline. It is split
 * into several submodules:
 *
 * - `batch`: Grouping of selected sentences into bounded batches
 * - `prompts`: Prompt templates and request construction
 * - `requester`: Service calls with retry, backoff and timeout
 * - `reconcile`: Response parsing and write-back
 * - `pipeline`: Orchestration of a whole document run
 */

// Re-export main types for easier usage
pub use self::batch::{BatchEntry, BatchPlanner, EntryTag, TranslationBatch};
pub use self::pipeline::{CancellationFlag, PipelineConfig, PipelineOrchestrator, PipelineState, PipelineStats};
pub use self::prompts::{BatchPromptBuilder, PromptTemplate, ServiceRequest};
pub use self::reconcile::{ReconciliationReport, ResponseReconciler};
pub use self::requester::{RetryPolicy, TranslationRequester};

// Submodules
pub mod batch;
pub mod pipeline;
pub mod prompts;
pub mod reconcile;
pub mod requester;
