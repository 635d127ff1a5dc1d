//! Siumai client factory.

use docanalyst_core::{AnalystError, Result, config::LlmConfig};
use siumai::prelude::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Providers the factory knows how to build.
pub const SUPPORTED_PROVIDERS: [&str; 3] = ["openai", "anthropic", "ollama"];

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Builds siumai chat clients from configuration.
///
/// A client is bound to one sampling profile (temperature and token budget),
/// so callers that mix profiles build one client per profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleFactory;

impl OracleFactory {
    /// Create a new factory instance.
    pub fn new() -> Self {
        Self
    }

    /// Whether `provider` is one the factory can build.
    pub fn supports(provider: &str) -> bool {
        SUPPORTED_PROVIDERS.contains(&provider.to_lowercase().as_str())
    }

    /// Create a client for `config` with the given sampling settings.
    pub async fn create_client(
        &self,
        config: &LlmConfig,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Arc<dyn ChatCapability>> {
        info!("Creating LLM client for provider: {}", config.provider);

        match config.provider.to_lowercase().as_str() {
            "openai" => Self::create_openai_client(config, temperature, max_tokens).await,
            "anthropic" => Self::create_anthropic_client(config, temperature, max_tokens).await,
            "ollama" => Self::create_ollama_client(config, temperature, max_tokens).await,
            provider => {
                warn!("Unsupported LLM provider: {}", provider);
                Err(AnalystError::configuration(format!(
                    "Unsupported LLM provider: {provider}"
                )))
            }
        }
    }

    async fn create_openai_client(
        config: &LlmConfig,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Arc<dyn ChatCapability>> {
        let api_key = required_key(config, "OpenAI")?;
        debug!("Creating OpenAI client with model: {}", config.model);

        let mut builder = Siumai::builder()
            .openai()
            .api_key(api_key)
            .model(&config.model)
            .temperature(temperature)
            .max_tokens(max_tokens);

        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(base_url);
        }

        let client = builder.build().await.map_err(|e| {
            AnalystError::configuration(format!("Failed to create OpenAI client: {e}"))
        })?;

        Ok(Arc::new(client))
    }

    async fn create_anthropic_client(
        config: &LlmConfig,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Arc<dyn ChatCapability>> {
        let api_key = required_key(config, "Anthropic")?;
        debug!("Creating Anthropic client with model: {}", config.model);

        let mut builder = Siumai::builder()
            .anthropic()
            .api_key(api_key)
            .model(&config.model)
            .temperature(temperature)
            .max_tokens(max_tokens);

        if let Some(base_url) = &config.base_url {
            builder = builder.base_url(base_url);
        }

        let client = builder.build().await.map_err(|e| {
            AnalystError::configuration(format!("Failed to create Anthropic client: {e}"))
        })?;

        Ok(Arc::new(client))
    }

    async fn create_ollama_client(
        config: &LlmConfig,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Arc<dyn ChatCapability>> {
        debug!("Creating Ollama client with model: {}", config.model);

        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL);

        let client = Siumai::builder()
            .ollama()
            .base_url(base_url)
            .model(&config.model)
            .temperature(temperature)
            .max_tokens(max_tokens)
            .build()
            .await
            .map_err(|e| {
                AnalystError::configuration(format!("Failed to create Ollama client: {e}"))
            })?;

        Ok(Arc::new(client))
    }
}

fn required_key<'a>(config: &'a LlmConfig, provider: &str) -> Result<&'a str> {
    config
        .api_key
        .as_deref()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| AnalystError::configuration(format!("API key is required for {provider}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_providers() {
        assert!(OracleFactory::supports("openai"));
        assert!(OracleFactory::supports("Ollama"));
        assert!(!OracleFactory::supports("google"));
    }

    #[tokio::test]
    async fn test_unsupported_provider_is_configuration_error() {
        let config = LlmConfig::new("google", "gemini-pro").with_api_key("key");
        let err = OracleFactory::new()
            .create_client(&config, 0.1, 100)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AnalystError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_missing_key_is_rejected_before_building() {
        let config = LlmConfig::new("anthropic", "claude-3-5-haiku");
        let err = OracleFactory::new()
            .create_client(&config, 0.1, 100)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("API key is required for Anthropic"));
    }
}
