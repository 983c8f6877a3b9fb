//! The closed set of LLM backends, resolved once from configuration.

use async_trait::async_trait;

use crate::config::{AiConfig, AiProvider};
use crate::ports::{CompletionRequest, ProviderClient, RawCompletion, TransportError};

use super::{GeminiConfig, GeminiProvider, MockProvider, OpenAIConfig, OpenAIProvider};

/// Concrete provider chosen at startup.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    OpenAI(OpenAIProvider),
    Gemini(GeminiProvider),
    Mock(MockProvider),
}

impl LlmProvider {
    /// Builds the configured backend. The caller validates `config` first.
    pub fn from_config(config: &AiConfig) -> Result<Self, reqwest::Error> {
        let api_key = config.api_key.clone().unwrap_or_default();
        match config.provider {
            AiProvider::OpenAI => {
                let provider_config = OpenAIConfig::new(api_key)
                    .with_model(config.model())
                    .with_base_url(config.base_url())
                    .with_timeout(config.timeout());
                Ok(Self::OpenAI(OpenAIProvider::new(provider_config)?))
            }
            AiProvider::Gemini => {
                let provider_config = GeminiConfig::new(api_key)
                    .with_model(config.model())
                    .with_base_url(config.base_url())
                    .with_timeout(config.timeout());
                Ok(Self::Gemini(GeminiProvider::new(provider_config)?))
            }
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAI(p) => p.model(),
            Self::Gemini(p) => p.model(),
            Self::Mock(_) => "mock-model-1",
        }
    }
}

#[async_trait]
impl ProviderClient for LlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<RawCompletion, TransportError> {
        match self {
            Self::OpenAI(p) => p.complete(request).await,
            Self::Gemini(p) => p.complete(request).await,
            Self::Mock(p) => p.complete(request).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::OpenAI(p) => p.name(),
            Self::Gemini(p) => p.name(),
            Self::Mock(p) => p.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(provider: AiProvider) -> AiConfig {
        AiConfig {
            provider,
            api_key: Some("key".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn openai_config_resolves_openai() {
        let provider = LlmProvider::from_config(&config(AiProvider::OpenAI)).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.model(), "gpt-3.5-turbo");
    }

    #[test]
    fn gemini_config_resolves_gemini() {
        let provider = LlmProvider::from_config(&config(AiProvider::Gemini)).unwrap();
        assert_eq!(provider.name(), "gemini");
        assert!(provider.model().starts_with("gemini"));
    }

    #[test]
    fn model_override_is_applied() {
        let mut cfg = config(AiProvider::OpenAI);
        cfg.model = Some("gpt-4o-mini".to_string());
        assert_eq!(LlmProvider::from_config(&cfg).unwrap().model(), "gpt-4o-mini");
    }
}
