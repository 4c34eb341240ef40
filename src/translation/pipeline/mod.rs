/*!
 * Translation pipeline for selective book translation.
 *
 * The pipeline processes one document through four phases:
 * 1. **Selection**: Score every sentence and decide what to translate
 * 2. **Batching**: Group selected sentences with surrounding context
 * 3. **Translation**: Send batches to the provider with retries
 * 4. **Reconciliation**: Validate responses and write translations back
 */

pub mod orchestrator;

pub use orchestrator::{
    CancellationFlag, PipelineConfig, PipelineOrchestrator, PipelineState, PipelineStats,
};
