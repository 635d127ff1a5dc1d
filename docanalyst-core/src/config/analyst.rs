//! Top-level configuration.
//!
//! [`AnalystConfig`] bundles every section. It can be read from a JSON file or
//! from environment variables:
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `LLM_PROVIDER` | oracle provider | `openai` |
//! | `LLM_MODEL` | oracle model | `gpt-4o-mini` |
//! | `LLM_API_KEY` | oracle credential | required unless ollama |
//! | `LLM_API_URL` | oracle base URL | provider default |
//! | `MONGODB_URI` | store connection string | required |
//! | `MONGODB_DATABASE` | store database | required |
//! | `RATE_LIMIT_CALLS` | oracle calls per window | `60` |
//! | `RATE_LIMIT_PERIOD` | window length (seconds) | `60` |
//! | `MAX_RETRIES` | both retry budgets | `3` |
//! | `LOG_LEVEL` | tracing level | `info` |

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use super::{LlmConfig, RateLimitConfig, StoreConfig, WorkflowConfig};
use crate::{AnalystError, Result};

/// Configuration for the whole analyst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Oracle settings.
    pub llm: LlmConfig,

    /// Document store settings.
    pub store: StoreConfig,

    /// Workflow settings.
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Oracle rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AnalystConfig {
    /// Create a configuration with default workflow and rate-limit sections.
    pub fn new(llm: LlmConfig, store: StoreConfig) -> Self {
        Self {
            llm,
            store,
            workflow: WorkflowConfig::default(),
            rate_limit: RateLimitConfig::default(),
            log_level: default_log_level(),
        }
    }

    /// Replace the workflow section.
    #[must_use]
    pub fn with_workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = workflow;
        self
    }

    /// Replace the rate-limit section.
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains invalid JSON.
    pub async fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration file: {}", path.display());

        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AnalystError::configuration(format!(
                "Failed to read configuration file {}: {e}",
                path.display()
            ))
        })?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            AnalystError::configuration(format!("Failed to parse JSON configuration: {e}"))
        })
    }

    /// Convert configuration to a JSON string.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            AnalystError::configuration(format!(
                "Failed to serialize configuration to JSON: {e}"
            ))
        })
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from any key lookup.
    ///
    /// Every missing required variable is reported in a single error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = get("LLM_PROVIDER").unwrap_or_else(|| "openai".to_string());
        let model = get("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string());
        let mut llm = LlmConfig::new(provider, model);
        llm.api_key = get("LLM_API_KEY");
        llm.base_url = get("LLM_API_URL");

        let mut missing = Vec::new();
        let uri = get("MONGODB_URI");
        let database = get("MONGODB_DATABASE");
        if uri.is_none() {
            missing.push("MONGODB_URI");
        }
        if database.is_none() {
            missing.push("MONGODB_DATABASE");
        }
        if llm.requires_api_key() && llm.api_key.is_none() {
            missing.push("LLM_API_KEY");
        }
        if !missing.is_empty() {
            return Err(AnalystError::configuration(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let mut config = Self::new(
            llm,
            StoreConfig::new(uri.unwrap_or_default(), database.unwrap_or_default()),
        );

        if let Some(calls) = get("RATE_LIMIT_CALLS") {
            config.rate_limit.max_calls = parse_var("RATE_LIMIT_CALLS", &calls)?;
        }
        if let Some(period) = get("RATE_LIMIT_PERIOD") {
            config.rate_limit.period_secs = parse_var("RATE_LIMIT_PERIOD", &period)?;
        }
        if let Some(retries) = get("MAX_RETRIES") {
            config.workflow = config
                .workflow
                .with_max_retries(parse_var("MAX_RETRIES", &retries)?);
        }
        if let Some(level) = get("LOG_LEVEL") {
            config.log_level = level.to_lowercase();
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.llm.validate()?;
        self.store.validate()?;
        self.workflow.validate()?;
        self.rate_limit.validate()?;

        if !matches!(
            self.log_level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(AnalystError::configuration(format!(
                "Unknown log level: {}",
                self.log_level
            )));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        AnalystError::configuration(format!("Invalid value for {key} ('{value}'): {e}"))
    })
}
