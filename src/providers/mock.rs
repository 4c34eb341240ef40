/*!
 * Mock provider implementations for testing.
 *
 * This module provides a scripted provider that simulates different behaviors:
 * - `MockProvider::working()` - Answers every TRANSLATE entry
 * - `MockProvider::dropping(n)` - Leaves out every Nth TRANSLATE entry
 * - `MockProvider::malformed()` - Answers with lines that do not parse
 * - `MockProvider::failing()` - Always fails with a transient error
 * - `MockProvider::unauthorized()` - Always fails with a permanent error
 * - `MockProvider::failing_when(pred)` - Fails only for matching requests
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::translation::batch::EntryTag;
use crate::translation::pipeline::CancellationFlag;
use crate::translation::prompts::ServiceRequest;

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with one line per TRANSLATE entry
    Working,
    /// Succeeds but omits every Nth TRANSLATE entry (1-based)
    DropEvery { nth: usize },
    /// Succeeds but no line follows the `id: text` format
    Malformed,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with a transient error
    Failing,
    /// Always fails with an authentication error
    Unauthorized,
    /// Returns empty response
    Empty,
    /// Simulates slow response (for timeout testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for testing translation behavior
#[derive(Debug)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Requests received so far, in arrival order
    requests: Arc<Mutex<Vec<ServiceRequest>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
    /// Requests matching this predicate fail with a 503
    fail_when: Option<fn(&ServiceRequest) -> bool>,
    /// Custom response generator (optional)
    custom_response: Option<fn(&ServiceRequest) -> String>,
    /// Raise the flag once this many requests have completed
    cancel_after: Option<(usize, CancellationFlag)>,
    /// Artificial latency added to every call
    latency: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
            fail_when: None,
            custom_response: None,
            cancel_after: None,
            latency: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn dropping(nth: usize) -> Self {
        Self::new(MockBehavior::DropEvery { nth })
    }

    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Working provider that fails every request matching `predicate`
    pub fn failing_when(predicate: fn(&ServiceRequest) -> bool) -> Self {
        let mut provider = Self::working();
        provider.fail_when = Some(predicate);
        provider
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&ServiceRequest) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Cancel `flag` once `requests` calls have returned
    pub fn cancel_after(mut self, requests: usize, flag: CancellationFlag) -> Self {
        self.cancel_after = Some((requests, flag));
        self
    }

    /// Number of `complete` calls so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received
    pub fn requests(&self) -> Vec<ServiceRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of concurrent `complete` calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// One `id: [target] text` line per TRANSLATE entry
    pub fn echo_response(request: &ServiceRequest) -> String {
        request
            .entries
            .iter()
            .filter(|e| e.tag == EntryTag::Translate)
            .map(|e| format!("{}: [{}] {}", e.id, request.target_language, e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn respond(&self, request: &ServiceRequest, count: usize) -> Result<String, ProviderError> {
        if let Some(predicate) = self.fail_when {
            if predicate(request) {
                return Err(service_unavailable());
            }
        }

        match self.behavior {
            MockBehavior::Working | MockBehavior::Slow { .. } => Ok(self.generate(request)),

            MockBehavior::DropEvery { nth } => {
                let nth = nth.max(1);
                let kept: Vec<String> = self
                    .generate(request)
                    .lines()
                    .enumerate()
                    .filter(|(i, _)| (i + 1) % nth != 0)
                    .map(|(_, line)| line.to_string())
                    .collect();
                Ok(kept.join("\n"))
            }

            MockBehavior::Malformed => Ok(request
                .translate_ids()
                .map(|id| format!("Translation number {} follows", id))
                .collect::<Vec<_>>()
                .join("\n")),

            MockBehavior::Intermittent { fail_every } => {
                let fail_every = fail_every.max(1);
                if count % fail_every == fail_every - 1 {
                    Err(service_unavailable())
                } else {
                    Ok(self.generate(request))
                }
            }

            MockBehavior::Failing => Err(service_unavailable()),

            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError("invalid api key".to_string())),

            MockBehavior::Empty => Ok(String::new()),
        }
    }

    fn generate(&self, request: &ServiceRequest) -> String {
        match self.custom_response {
            Some(generator) => generator(request),
            None => Self::echo_response(request),
        }
    }
}

fn service_unavailable() -> ProviderError {
    ProviderError::ApiError {
        status_code: 503,
        message: "Simulated API failure".to_string(),
    }
}

impl Clone for MockProvider {
    fn clone(&self) -> Self {
        Self {
            behavior: self.behavior,
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
            in_flight: Arc::clone(&self.in_flight),
            peak_in_flight: Arc::clone(&self.peak_in_flight),
            fail_when: self.fail_when,
            custom_response: self.custom_response,
            cancel_after: self.cancel_after.clone(),
            latency: self.latency,
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ServiceRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = match self.behavior {
            MockBehavior::Slow { delay_ms } => Some(Duration::from_millis(delay_ms)),
            _ => self.latency,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let result = self.respond(request, count);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some((after, flag)) = &self.cancel_after {
            if count + 1 >= *after {
                flag.cancel();
            }
        }
        result
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        match self.behavior {
            MockBehavior::Failing => Err(service_unavailable()),
            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError("invalid api key".to_string())),
            _ => Ok(()),
        }
    }
}
