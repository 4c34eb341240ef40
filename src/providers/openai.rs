/*!
 * OpenAI-compatible chat completions backend.
 *
 * Also used for LM Studio, which exposes the same API locally and does not
 * require a key.
 */

use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigurationError, ProviderError};
use crate::translation::prompts::ServiceRequest;

use super::{GenerationSettings, Provider, http_client, parse_endpoint, status_error, transport_error};

/// OpenAI client for interacting with OpenAI-compatible APIs
#[derive(Debug)]
pub struct OpenAI {
    /// Display name used in logs and errors ("OpenAI", "LM Studio")
    label: String,
    client: Client,
    api_key: Option<String>,
    /// Chat completions URL
    url: String,
    model: String,
    settings: GenerationSettings,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

/// Chat message
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl OpenAI {
    pub fn new(
        label: &str,
        endpoint: &str,
        api_key: &str,
        model: &str,
        settings: GenerationSettings,
    ) -> Result<Self, ConfigurationError> {
        let base = parse_endpoint(endpoint, "endpoint")?;
        // Local servers accept any key; the public API does not.
        let api_key = Some(api_key.trim().to_string()).filter(|k| !k.is_empty());
        if api_key.is_none() && base.contains("api.openai.com") {
            return Err(ConfigurationError::MissingApiKey(label.to_string()));
        }

        Ok(Self {
            label: label.to_string(),
            client: http_client(settings.timeout)?,
            api_key,
            url: format!("{}/chat/completions", base),
            model: model.to_string(),
            settings,
        })
    }

    fn chat_request(&self, system: &str, user: &str, max_tokens: u32) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user.to_string(),
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens,
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut builder = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} API error ({}): {}", self.label, status, body);
            return Err(status_error(status, body));
        }

        response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("{} response: {}", self.label, e)))
    }
}

#[async_trait]
impl Provider for OpenAI {
    fn name(&self) -> &str {
        &self.label
    }

    async fn complete(&self, request: &ServiceRequest) -> Result<String, ProviderError> {
        let body = self.chat_request(&request.system_prompt, &request.prompt, self.settings.max_tokens);
        let response = self.send(&body).await?;

        if let Some(usage) = &response.usage {
            debug!(
                "{} usage: {} prompt / {} completion tokens",
                self.label, usage.prompt_tokens, usage.completion_tokens
            );
        }

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseError(format!("{} returned no choices", self.label)))
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.send(&self.chat_request("", "Hello", 5)).await.map(|_| ())
    }
}
