use anyhow::{Context, Result, anyhow};
use log::info;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::difficulty::{ProficiencyLevel, ThresholdTable};
use crate::errors::ConfigurationError;
use crate::language_utils;
use crate::providers::parse_endpoint;
use crate::translation::{PipelineConfig, RetryPolicy};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Language of the books (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Language translations are written in (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Reader's proficiency; sentences at or below it are translated
    #[serde(default = "default_user_level")]
    pub user_level: ProficiencyLevel,

    /// Difficulty scoring settings
    #[serde(default)]
    pub difficulty: DifficultyConfig,

    /// Batch planning settings
    #[serde(default)]
    pub batching: BatchingConfig,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    /// Hosted APIs refuse requests without a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

// Implement Display trait for TranslationProvider
impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for TranslationProvider
impl std::str::FromStr for TranslationProvider {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(ConfigurationError::UnknownProvider(s.to_string())),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Completion budget per batch
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (model, endpoint, timeout_secs) = match provider_type {
            TranslationProvider::Ollama => (default_ollama_model(), default_ollama_endpoint(), default_timeout_secs()),
            TranslationProvider::OpenAI => (default_openai_model(), default_openai_endpoint(), default_timeout_secs()),
            TranslationProvider::Anthropic => (
                default_anthropic_model(),
                default_anthropic_endpoint(),
                default_anthropic_timeout_secs(),
            ),
            TranslationProvider::LMStudio => {
                (default_lmstudio_model(), default_lmstudio_endpoint(), default_timeout_secs())
            }
        };

        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            max_tokens: default_max_tokens(),
            timeout_secs,
        }
    }
}

/// Difficulty scoring settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DifficultyConfig {
    /// Minimum mean Zipf score per level
    #[serde(default)]
    pub thresholds: ThresholdTable,

    /// Score used for words missing from the frequency table
    #[serde(default = "default_unknown_word_penalty")]
    pub unknown_word_penalty: f64,

    /// JSON frequency table: `{"en": {"the": 7.73, ...}}`
    #[serde(default = "default_lexicon_path")]
    pub lexicon_path: String,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        Self {
            thresholds: ThresholdTable::default(),
            unknown_word_penalty: default_unknown_word_penalty(),
            lexicon_path: default_lexicon_path(),
        }
    }
}

/// Batch planning settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BatchingConfig {
    /// Maximum entries (context included) per request
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Context sentences on each side of a translated one
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Maximum number of concurrent requests
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            context_window: default_context_window(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationCommonConfig {
    /// Replacement system prompt
    /// Placeholders: {source_language}, {target_language}
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Extra guidance appended to every request (e.g. formality)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff base for retries (in milliseconds), doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for a single backoff delay (in milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    /// Lower values make output more deterministic, higher values more creative
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            custom_instructions: None,
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            temperature: default_temperature(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "fr".to_string()
}

fn default_user_level() -> ProficiencyLevel {
    ProficiencyLevel::B1
}

fn default_unknown_word_penalty() -> f64 {
    2.0
}

fn default_lexicon_path() -> String {
    "lexicon.json".to_string()
}

fn default_max_batch_size() -> usize {
    40
}

fn default_context_window() -> usize {
    2
}

fn default_max_in_flight() -> usize {
    3
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_anthropic_timeout_secs() -> u64 {
    180
}

fn default_retry_count() -> u32 {
    3 // Default to 3 retries
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_ollama_model() -> String {
    "llama3.2".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-haiku-20240307".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

impl Config {
    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Write the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// Load `path`, or write a default configuration there when it is missing
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        let config = Self::default();
        config
            .save(path)
            .map_err(|e| anyhow!("No configuration at {} and a default could not be written: {}", path.display(), e))?;
        info!("Created default configuration at {}", path.display());
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.validate_selection()?;
        self.validate_translation()
    }

    /// Validate what classification and batching need; no provider involved
    pub fn validate_selection(&self) -> Result<(), ConfigurationError> {
        // Validate languages
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

        self.difficulty.thresholds.validate()?;
        let penalty = self.difficulty.unknown_word_penalty;
        if !penalty.is_finite() || penalty < 0.0 {
            return Err(ConfigurationError::invalid_value(
                "unknown_word_penalty",
                format!("{} is not a non-negative number", penalty),
            ));
        }

        if self.batching.max_batch_size == 0 {
            return Err(ConfigurationError::invalid_value("max_batch_size", "must be at least 1"));
        }
        if self.batching.max_in_flight == 0 {
            return Err(ConfigurationError::invalid_value("max_in_flight", "must be at least 1"));
        }

        Ok(())
    }

    /// Validate the translation section and the active provider
    pub fn validate_translation(&self) -> Result<(), ConfigurationError> {
        let common = &self.translation.common;
        if !(0.0..=2.0).contains(&common.temperature) {
            return Err(ConfigurationError::invalid_value(
                "temperature",
                format!("{} is outside 0.0..=2.0", common.temperature),
            ));
        }
        self.retry_policy()?;

        // Validate the active provider
        let provider = self.translation.active_provider_config();
        if self.translation.provider.requires_api_key() && provider.api_key.trim().is_empty() {
            return Err(ConfigurationError::MissingApiKey(
                self.translation.provider.display_name().to_string(),
            ));
        }
        if provider.model.trim().is_empty() {
            return Err(ConfigurationError::invalid_value("model", "must not be empty"));
        }
        if provider.timeout_secs == 0 {
            return Err(ConfigurationError::invalid_value("timeout_secs", "must be positive"));
        }
        parse_endpoint(&provider.endpoint, "endpoint")?;

        Ok(())
    }

    /// Retry settings of the common section
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigurationError> {
        let common = &self.translation.common;
        RetryPolicy::new(
            common.retry_count.saturating_add(1),
            Duration::from_millis(common.retry_backoff_ms),
            Duration::from_millis(common.max_backoff_ms),
        )
    }

    /// Settings for one pipeline run
    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigurationError> {
        let provider = self.translation.active_provider_config();
        Ok(
            PipelineConfig::new(&self.source_language, &self.target_language, self.user_level)
                .with_batching(self.batching.max_batch_size, self.batching.context_window)
                .with_max_in_flight(self.batching.max_in_flight)
                .with_retry(self.retry_policy()?)
                .with_request_timeout(Duration::from_secs(provider.timeout_secs))
                .with_system_prompt(self.translation.common.system_prompt.clone())
                .with_custom_instructions(self.translation.common.custom_instructions.clone()),
        )
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            user_level: default_user_level(),
            difficulty: DifficultyConfig::default(),
            batching: BatchingConfig::default(),
            translation: TranslationConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Get a mutable provider configuration, adding a default one if needed
    pub fn provider_config_mut(&mut self, provider_type: &TranslationProvider) -> &mut ProviderConfig {
        let provider_str = provider_type.to_lowercase_string();
        match self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            Some(index) => &mut self.available_providers[index],
            None => {
                self.available_providers.push(ProviderConfig::new(provider_type.clone()));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Configuration of the active provider, empty fields filled with defaults
    pub fn active_provider_config(&self) -> ProviderConfig {
        let defaults = ProviderConfig::new(self.provider.clone());
        let Some(configured) = self.get_provider_config(&self.provider) else {
            return defaults;
        };

        let mut config = configured.clone();
        if config.model.is_empty() {
            config.model = defaults.model;
        }
        if config.endpoint.is_empty() {
            config.endpoint = defaults.endpoint;
        }
        config
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.active_provider_config().model
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
