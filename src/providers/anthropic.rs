/*!
 * Anthropic messages API backend.
 */

use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::errors::{ConfigurationError, ProviderError};
use crate::translation::prompts::ServiceRequest;

use super::{GenerationSettings, Provider, http_client, parse_endpoint, status_error, transport_error};

const API_VERSION: &str = "2023-06-01";

/// Anthropic client for interacting with Anthropic API
#[derive(Debug)]
pub struct Anthropic {
    client: Client,
    api_key: String,
    /// Messages URL
    url: String,
    model: String,
    settings: GenerationSettings,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,
    pub content: String,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicContent>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default)]
    pub text: String,
}

impl AnthropicResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect()
    }
}

impl Anthropic {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        model: &str,
        settings: GenerationSettings,
    ) -> Result<Self, ConfigurationError> {
        if api_key.trim().is_empty() {
            return Err(ConfigurationError::MissingApiKey("Anthropic".to_string()));
        }
        let endpoint = if endpoint.trim().is_empty() {
            "https://api.anthropic.com"
        } else {
            endpoint
        };
        Ok(Self {
            client: http_client(settings.timeout)?,
            api_key: api_key.to_string(),
            url: format!("{}/v1/messages", parse_endpoint(endpoint, "endpoint")?),
            model: model.to_string(),
            settings,
        })
    }

    fn request(&self, system: Option<&str>, user: &str, max_tokens: u32) -> AnthropicRequest {
        AnthropicRequest {
            model: self.model.clone(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            system: system.map(str::to_string),
            temperature: self.settings.temperature,
            max_tokens,
        }
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<AnthropicResponse, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(e, self.settings.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Anthropic API error ({}): {}", status, body);
            return Err(status_error(status, body));
        }

        response
            .json::<AnthropicResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(format!("Anthropic response: {}", e)))
    }
}

#[async_trait]
impl Provider for Anthropic {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &ServiceRequest) -> Result<String, ProviderError> {
        let body = self.request(Some(&request.system_prompt), &request.prompt, self.settings.max_tokens);
        Ok(self.send(&body).await?.text())
    }

    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.send(&self.request(None, "Hello", 10)).await.map(|_| ())
    }
}
