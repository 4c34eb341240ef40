/*!
 * Sends one batch to the translation service with bounded retries.
 *
 * Each call is wrapped in a timeout. Transient failures (rate limiting,
 * transport errors, timeouts, 5xx, empty answers) are retried with
 * exponential backoff; anything else fails the batch at once.
 */

use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, warn};
use rand::Rng;

use crate::document::SentenceLocation;
use crate::errors::{ConfigurationError, ProviderError, ServiceError};
use crate::providers::Provider;
use crate::translation::batch::{BatchEntry, EntryTag, TranslationBatch};
use crate::translation::prompts::{BatchPromptBuilder, PromptTemplate};
use crate::translation::reconcile::parse_response;

/// Attempt count and delay schedule for one batch
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total number of calls, first one included
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Add up to a quarter of the delay at random
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Result<Self, ConfigurationError> {
        let policy = Self {
            max_attempts,
            base_delay,
            max_delay,
            jitter: true,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Retry without waiting (tests, local backends)
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid_value("max_attempts", "must be at least 1"));
        }
        if self.max_delay < self.base_delay {
            return Err(ConfigurationError::invalid_value(
                "max_delay",
                format!("{:?} is below the base delay {:?}", self.max_delay, self.base_delay),
            ));
        }
        Ok(())
    }

    /// Delay after the given failed attempt (1-based): `base * 2^(attempt-1)`,
    /// capped at `max_delay`, plus optional jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        let delay = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let millis = delay.as_millis() as u64;
        if !self.jitter || millis < 4 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=millis / 4))
    }
}

/// Turns batches into service calls.
#[derive(Debug, Clone)]
pub struct TranslationRequester {
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    timeout: Duration,
    template: PromptTemplate,
    custom_instructions: Option<String>,
}

impl TranslationRequester {
    pub fn new(provider: Arc<dyn Provider>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            provider,
            retry,
            timeout,
            template: PromptTemplate::default(),
            custom_instructions: None,
        }
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    pub fn with_custom_instructions(mut self, instructions: Option<String>) -> Self {
        self.custom_instructions = instructions;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    fn prompt_builder(&self, source_language: &str, target_language: &str) -> BatchPromptBuilder {
        let builder = BatchPromptBuilder::new(source_language, target_language).with_template(self.template.clone());
        match &self.custom_instructions {
            Some(instructions) => builder.with_custom_instructions(instructions),
            None => builder,
        }
    }

    /// Translate one piece of text outside any document.
    ///
    /// The text goes out as a single-entry batch with the same prompt,
    /// timeout and retries as a planned batch. An answer without the
    /// `1:` prefix is taken as the translation itself.
    pub async fn translate_text(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ServiceError> {
        let batch = TranslationBatch {
            index: 0,
            entries: vec![BatchEntry {
                reference_id: 1,
                tag: EntryTag::Translate,
                text: text.trim().to_string(),
                sentence_id: 0,
                location: SentenceLocation {
                    chapter: 0,
                    paragraph: 0,
                    sentence: 0,
                },
            }],
        };

        let raw = self.request(&batch, source_language, target_language).await?;
        let mut parsed = parse_response(&raw);
        Ok(parsed
            .translations
            .remove(&1)
            .unwrap_or_else(|| raw.trim().to_string()))
    }

    /// Send `batch` and return the raw response text.
    pub async fn request(
        &self,
        batch: &TranslationBatch,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ServiceError> {
        let request = self.prompt_builder(source_language, target_language).build(batch);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = match tokio::time::timeout(self.timeout, self.provider.complete(&request)).await {
                Ok(Ok(text)) if text.trim().is_empty() => {
                    Err(ProviderError::RequestFailed("empty response".to_string()))
                }
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.timeout)),
            };

            match outcome {
                Ok(text) => {
                    debug!(
                        "Batch {} answered by {} on attempt {} ({} chars)",
                        batch.index,
                        self.provider.name(),
                        attempt,
                        text.len()
                    );
                    return Ok(text);
                }
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "Batch {} attempt {}/{} failed: {}. Retrying in {:?}",
                        batch.index, attempt, self.retry.max_attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!("Batch {} giving up after {} attempt(s): {}", batch.index, attempt, e);
                    return Err(ServiceError {
                        batch_index: batch.index,
                        reference_ids: batch.reference_range().unwrap_or(0..=0),
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
