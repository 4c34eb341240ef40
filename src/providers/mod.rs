/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API and OpenAI-compatible servers (LM Studio)
 * - Anthropic: Anthropic API integration
 * - Mock: scripted in-process provider for tests
 *
 * Providers make exactly one call per `complete`. Retrying is the
 * requester's job, so every failure is mapped to a `ProviderError` whose
 * `is_transient` tells the requester whether to try again.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

use crate::app_config::{ProviderConfig, TranslationProvider};
use crate::errors::{ConfigurationError, ProviderError};
use crate::translation::prompts::ServiceRequest;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;

/// Common trait for all translation backends
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Send one batch request and return the raw response text
    async fn complete(&self, request: &ServiceRequest) -> Result<String, ProviderError>;

    /// Check that the backend is reachable and accepts our credentials
    async fn test_connection(&self) -> Result<(), ProviderError>;
}

/// Sampling settings shared by the HTTP backends
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

/// Create the backend selected in the configuration.
pub fn build_provider(
    kind: &TranslationProvider,
    config: &ProviderConfig,
    temperature: f32,
) -> Result<Arc<dyn Provider>, ConfigurationError> {
    let settings = GenerationSettings {
        temperature,
        max_tokens: config.max_tokens,
        timeout: Duration::from_secs(config.timeout_secs),
    };

    let provider: Arc<dyn Provider> = match kind {
        TranslationProvider::Ollama => Arc::new(ollama::Ollama::new(&config.endpoint, &config.model, settings)?),
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => Arc::new(openai::OpenAI::new(
            kind.display_name(),
            &config.endpoint,
            &config.api_key,
            &config.model,
            settings,
        )?),
        TranslationProvider::Anthropic => Arc::new(anthropic::Anthropic::new(
            &config.endpoint,
            &config.api_key,
            &config.model,
            settings,
        )?),
    };
    Ok(provider)
}

/// Shared HTTP client builder for the backends.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigurationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .map_err(|e| ConfigurationError::invalid_value("http_client", e.to_string()))
}

/// Parse and normalize a configured endpoint (no trailing slash).
pub(crate) fn parse_endpoint(endpoint: &str, field: &str) -> Result<String, ConfigurationError> {
    let url = url::Url::parse(endpoint.trim())
        .map_err(|e| ConfigurationError::invalid_value(field, format!("'{}': {}", endpoint, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigurationError::invalid_value(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Map a non-success HTTP status to a provider error.
pub(crate) fn status_error(status: StatusCode, body: String) -> ProviderError {
    let message = truncate(&body, 500);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::AuthenticationError(message),
        _ => ProviderError::ApiError {
            status_code: status.as_u16(),
            message,
        },
    }
}

/// Map a transport-level reqwest failure to a provider error.
pub(crate) fn transport_error(error: reqwest::Error, timeout: Duration) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else if error.is_decode() {
        ProviderError::ParseError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "…"
    } else {
        text.to_string()
    }
}
