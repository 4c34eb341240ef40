/*!
 * Tests for the provider factory and the scripted provider
 */

use mlbooks::app_config::{ProviderConfig, TranslationProvider};
use mlbooks::errors::ConfigurationError;
use mlbooks::providers::mock::MockProvider;
use mlbooks::providers::{Provider, build_provider};
use mlbooks::translation::prompts::RequestEntry;
use mlbooks::translation::{EntryTag, ServiceRequest};

fn request(ids: &[u64]) -> ServiceRequest {
    ServiceRequest {
        entries: ids
            .iter()
            .map(|id| RequestEntry {
                id: *id,
                tag: EntryTag::Translate,
                text: format!("Sentence {}.", id),
            })
            .collect(),
        source_language: "en".to_string(),
        target_language: "fr".to_string(),
        system_prompt: String::new(),
        prompt: String::new(),
    }
}

/// Test that the factory picks the backend named in the configuration
#[test]
fn test_buildProvider_shouldSelectBackendByKind() {
    let ollama = build_provider(
        &TranslationProvider::Ollama,
        &ProviderConfig::new(TranslationProvider::Ollama),
        0.3,
    )
    .unwrap();
    assert_eq!(ollama.name(), "ollama");

    let lmstudio = build_provider(
        &TranslationProvider::LMStudio,
        &ProviderConfig::new(TranslationProvider::LMStudio),
        0.3,
    )
    .unwrap();
    assert_eq!(lmstudio.name(), "LM Studio");

    let mut anthropic_config = ProviderConfig::new(TranslationProvider::Anthropic);
    anthropic_config.api_key = "sk-ant-test".to_string();
    let anthropic = build_provider(&TranslationProvider::Anthropic, &anthropic_config, 0.3).unwrap();
    assert_eq!(anthropic.name(), "anthropic");
}

/// Test that hosted backends refuse to start without a key
#[test]
fn test_buildProvider_hostedWithoutKey_shouldFail() {
    let result = build_provider(
        &TranslationProvider::OpenAI,
        &ProviderConfig::new(TranslationProvider::OpenAI),
        0.3,
    );
    assert!(matches!(result, Err(ConfigurationError::MissingApiKey(name)) if name == "OpenAI"));

    let result = build_provider(
        &TranslationProvider::Anthropic,
        &ProviderConfig::new(TranslationProvider::Anthropic),
        0.3,
    );
    assert!(matches!(result, Err(ConfigurationError::MissingApiKey(_))));
}

/// Test that a malformed endpoint is a configuration error
#[test]
fn test_buildProvider_badEndpoint_shouldFail() {
    let mut config = ProviderConfig::new(TranslationProvider::Ollama);
    config.endpoint = "not a url".to_string();

    assert!(matches!(
        build_provider(&TranslationProvider::Ollama, &config, 0.3),
        Err(ConfigurationError::InvalidValue { .. })
    ));
}

/// Test that an unreachable local server surfaces as a retryable error
#[tokio::test]
async fn test_testConnection_unreachableServer_shouldBeTransient() {
    let mut config = ProviderConfig::new(TranslationProvider::Ollama);
    config.endpoint = "http://127.0.0.1:1".to_string();
    config.timeout_secs = 2;
    let provider = build_provider(&TranslationProvider::Ollama, &config, 0.3).unwrap();

    let error = provider.test_connection().await.unwrap_err();
    assert!(error.is_transient(), "unexpected error: {}", error);
}

/// Test that the scripted provider echoes requested ids with the target language
#[tokio::test]
async fn test_mockProvider_working_shouldEchoIds() {
    let provider = MockProvider::working();

    let response = provider.complete(&request(&[7, 8])).await.unwrap();

    assert_eq!(response, "7: [fr] Sentence 7.\n8: [fr] Sentence 8.");
    assert_eq!(provider.request_count(), 1);
    assert_eq!(provider.requests()[0].entries.len(), 2);
}

/// Test that clones share their counters
#[tokio::test]
async fn test_mockProvider_clone_shouldShareCounters() {
    let provider = MockProvider::failing();
    let clone = provider.clone();

    assert!(clone.complete(&request(&[1])).await.is_err());
    assert!(provider.test_connection().await.is_err());
    assert_eq!(provider.request_count(), 1);
}
