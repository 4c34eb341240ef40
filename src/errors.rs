/*!
 * Error types for the mlbooks library.
 *
 * Only configuration problems and cancellation stop a pipeline run. Provider
 * failures are wrapped into a per-batch `ServiceError` and the run continues
 * with the affected sentences left in the original language.
 */

use std::ops::RangeInclusive;
use std::time::Duration;

use thiserror::Error;

use crate::translation::pipeline::PipelineStats;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The call did not complete within the allotted time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Rate limiting, transport problems, timeouts and server-side (5xx)
    /// failures are transient. Authentication, client (4xx) and parse
    /// failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimitExceeded(_) | Self::ConnectionError(_) | Self::Timeout(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            Self::RequestFailed(_) => true,
            Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Invalid or unsupported settings, detected before any batch work starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Source/target combination cannot be processed
    #[error("Unsupported language pair {source_language} -> {target_language}: {reason}")]
    UnsupportedLanguagePair {
        source_language: String,
        target_language: String,
        reason: String,
    },

    /// The level threshold table is incomplete or not descending
    #[error("Invalid threshold table: {0}")]
    InvalidThresholds(String),

    /// A numeric or textual setting is out of range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A hosted provider was selected without credentials
    #[error("API key is required for the {0} provider")]
    MissingApiKey(String),

    /// The provider name does not match any known backend
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// A batch could not be translated after exhausting its attempts
#[derive(Error, Debug, Clone)]
#[error("Batch {batch_index} (ids {}-{}) failed after {attempts} attempt(s): {source}", .reference_ids.start(), .reference_ids.end())]
pub struct ServiceError {
    /// Position of the batch in the plan
    pub batch_index: usize,
    /// First and last reference id carried by the batch
    pub reference_ids: RangeInclusive<u64>,
    /// Number of calls made before giving up
    pub attempts: u32,
    /// Last provider failure
    #[source]
    pub source: ProviderError,
}

/// Errors that end a pipeline run early
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Settings rejected before selection started
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// The ingested document violates its structural contract
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// The run was cancelled; the statistics cover everything reconciled so far
    #[error("Pipeline cancelled after {} of {} sentence(s) were resolved", .stats.translated, .stats.total_sentences)]
    Cancelled { stats: Box<PipelineStats> },
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the pipeline
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::File(error.to_string())
    }
}
