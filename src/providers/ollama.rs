/*!
 * Ollama backend (`/api/generate`, non-streaming).
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigurationError, ProviderError};
use crate::translation::prompts::ServiceRequest;

use super::{GenerationSettings, Provider, http_client, parse_endpoint, status_error, transport_error};

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model name
    model: String,
    /// HTTP client for making requests
    client: Client,
    settings: GenerationSettings,
}

/// Generate request for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationRequest {
    /// Model name to use for generation
    model: String,
    /// Prompt to generate from
    prompt: String,
    /// System message to guide the model
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    /// Additional model parameters
    options: GenerationOptions,
    /// Whether to stream the response
    stream: bool,
}

/// Generation options for the Ollama API
#[derive(Debug, Serialize)]
pub struct GenerationOptions {
    temperature: f32,
    /// Maximum number of tokens to generate
    num_predict: u32,
}

/// Generation response from the Ollama API
#[derive(Debug, Deserialize)]
pub struct GenerationResponse {
    /// Model name
    #[serde(default)]
    pub model: String,
    /// Generated text
    pub response: String,
    /// Whether the generation is complete
    #[serde(default)]
    pub done: bool,
    /// Number of generated tokens
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl Ollama {
    pub fn new(endpoint: &str, model: &str, settings: GenerationSettings) -> Result<Self, ConfigurationError> {
        if model.trim().is_empty() {
            return Err(ConfigurationError::invalid_value("model", "Ollama needs a model name"));
        }
        Ok(Self {
            base_url: parse_endpoint(endpoint, "endpoint")?,
            model: model.to_string(),
            client: http_client(settings.timeout)?,
            settings,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generation_request(&self, prompt: &str, system: Option<&str>) -> GenerationRequest {
        GenerationRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: system.map(str::to_string),
            options: GenerationOptions {
                temperature: self.settings.temperature,
                num_predict: self.settings.max_tokens,
            },
            stream: false,
        }
    }

    /// Send a generation request and return the parsed response
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Ollama API error ({}): {}", status, body);
            return Err(status_error(status, body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;
        parse_generation(&body)
    }
}

/// Ollama answers with a single object when `stream` is false, but some
/// proxies force streaming; JSON lines are concatenated in that case.
fn parse_generation(body: &str) -> Result<GenerationResponse, ProviderError> {
    if let Ok(response) = serde_json::from_str::<GenerationResponse>(body) {
        return Ok(response);
    }

    let mut text = String::new();
    let mut last: Option<GenerationResponse> = None;
    for line in body.lines().filter(|l| !l.trim().is_empty()) {
        let chunk: GenerationResponse = serde_json::from_str(line)
            .map_err(|e| ProviderError::ParseError(format!("Ollama response: {}", e)))?;
        text.push_str(&chunk.response);
        last = Some(chunk);
    }

    let mut response = last.ok_or_else(|| ProviderError::ParseError("empty Ollama response".to_string()))?;
    response.response = text;
    Ok(response)
}

#[async_trait]
impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &ServiceRequest) -> Result<String, ProviderError> {
        let generation = self.generation_request(&request.prompt, Some(&request.system_prompt));
        let response = self.generate(&generation).await?;
        debug!(
            "Ollama {} returned {} chars ({} tokens)",
            response.model,
            response.response.len(),
            response.eval_count.unwrap_or(0)
        );
        Ok(response.response)
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        let mut request = self.generation_request("Hello", None);
        request.options.num_predict = 1;
        self.generate(&request).await.map(|_| ())
    }
}
