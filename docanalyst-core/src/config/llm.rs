//! Configuration for the language-model oracle.
//!
//! The oracle is reached through the siumai crate. Prompts carry their own
//! sampling settings (low temperature for query authoring, slightly higher for
//! summaries); values set here override them for every call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{AnalystError, Result};

/// Configuration for the language-model oracle.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::config::LlmConfig;
///
/// let openai = LlmConfig::openai("gpt-4o-mini", "your-api-key").with_timeout(30);
/// assert!(openai.validate().is_ok());
///
/// let ollama = LlmConfig::ollama("llama3");
/// assert!(!ollama.requires_api_key());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// Provider name ("openai", "anthropic", "ollama").
    pub provider: String,

    /// Model name or identifier.
    pub model: String,

    /// API key for authentication (not needed for ollama).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL, for proxies and OpenAI-compatible endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Temperature override applied to every prompt.
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Token budget override applied to every prompt.
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl LlmConfig {
    /// Create a new LLM configuration.
    pub fn new<S1: Into<String>, S2: Into<String>>(provider: S1, model: S2) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            api_key: None,
            base_url: None,
            temperature: None,
            max_tokens: None,
            timeout_seconds: None,
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Override the temperature of every prompt.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Override the token budget of every prompt.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Resolve the sampling settings for a prompt.
    ///
    /// Configured overrides win over the prompt's own values.
    #[must_use]
    pub fn sampling(&self, prompt_temperature: f32, prompt_max_tokens: u32) -> (f32, u32) {
        (
            self.temperature.unwrap_or(prompt_temperature),
            self.max_tokens.unwrap_or(prompt_max_tokens),
        )
    }

    /// Get the effective timeout (with default).
    #[must_use]
    pub fn effective_timeout(&self) -> u64 {
        self.timeout_seconds.unwrap_or(60)
    }

    /// Check if API key is required.
    #[must_use]
    pub fn requires_api_key(&self) -> bool {
        !matches!(self.provider.as_str(), "ollama")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(AnalystError::configuration("Provider cannot be empty"));
        }

        if self.model.is_empty() {
            return Err(AnalystError::configuration("Model cannot be empty"));
        }

        if self.requires_api_key() && self.api_key.as_deref().is_none_or(str::is_empty) {
            return Err(AnalystError::configuration(format!(
                "API key is required for provider: {}",
                self.provider
            )));
        }

        if let Some(temp) = self.temperature {
            if !(0.0..=2.0).contains(&temp) {
                return Err(AnalystError::configuration(
                    "Temperature must be between 0.0 and 2.0",
                ));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(AnalystError::configuration(
                "Max tokens must be greater than 0",
            ));
        }

        if self.timeout_seconds == Some(0) {
            return Err(AnalystError::configuration(
                "Timeout must be greater than 0",
            ));
        }

        if let Some(url) = &self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AnalystError::configuration(
                    "Base URL must start with http:// or https://",
                ));
            }
        }

        Ok(())
    }

    /// Get connection information for logging (without sensitive data).
    #[must_use]
    pub fn connection_info(&self) -> HashMap<String, String> {
        let mut info = HashMap::new();
        info.insert("provider".to_string(), self.provider.clone());
        info.insert("model".to_string(), self.model.clone());

        if let Some(url) = &self.base_url {
            info.insert("base_url".to_string(), url.clone());
        }
        if let Some(temperature) = self.temperature {
            info.insert("temperature".to_string(), temperature.to_string());
        }
        info.insert(
            "timeout_seconds".to_string(),
            self.effective_timeout().to_string(),
        );

        info
    }

    /// Create a configuration for `OpenAI` models.
    pub fn openai<S: Into<String>>(model: S, api_key: S) -> Self {
        Self::new("openai", model).with_api_key(api_key)
    }

    /// Create a configuration for Anthropic models.
    pub fn anthropic<S: Into<String>>(model: S, api_key: S) -> Self {
        Self::new("anthropic", model).with_api_key(api_key)
    }

    /// Create a configuration for Ollama models.
    pub fn ollama<S: Into<String>>(model: S) -> Self {
        Self::new("ollama", model).with_base_url("http://localhost:11434")
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::new("openai", "gpt-4o-mini")
    }
}
