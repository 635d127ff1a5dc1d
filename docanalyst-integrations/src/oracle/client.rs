//! `LanguageModel` implementation over siumai chat clients.

use async_trait::async_trait;
use docanalyst_core::{AnalystError, LanguageModel, Prompt, Result, config::LlmConfig};
use siumai::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, instrument};

use super::factory::OracleFactory;

/// Temperature bits and token budget of one client.
type SamplingKey = (u32, u32);

enum ClientSource {
    /// One caller-supplied client; prompt sampling settings are not applied.
    Fixed(Arc<dyn ChatCapability>),
    /// Clients built on demand, one per sampling profile.
    Managed {
        factory: OracleFactory,
        clients: RwLock<HashMap<SamplingKey, Arc<dyn ChatCapability>>>,
    },
}

/// Language-model oracle that talks to a chat provider through siumai.
///
/// Each prompt becomes a system message and a user message. Transport
/// failures, timeouts and responses without text are all oracle errors.
///
/// # Examples
///
/// ```rust,no_run
/// use docanalyst_core::{LanguageModel, Prompt, PromptPurpose, config::LlmConfig};
/// use docanalyst_integrations::SiumaiOracle;
///
/// # async fn example() -> docanalyst_core::Result<()> {
/// let oracle = SiumaiOracle::from_config(LlmConfig::ollama("llama3"))?;
/// let prompt = Prompt::new(PromptPurpose::QueryIntent, "You check queries.", "...");
/// let reply = oracle.complete(&prompt).await?;
/// println!("{reply}");
/// # Ok(())
/// # }
/// ```
pub struct SiumaiOracle {
    config: LlmConfig,
    source: ClientSource,
}

impl std::fmt::Debug for SiumaiOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let source = match &self.source {
            ClientSource::Fixed(_) => "fixed",
            ClientSource::Managed { .. } => "managed",
        };
        f.debug_struct("SiumaiOracle")
            .field("provider", &self.config.provider)
            .field("model", &self.config.model)
            .field("clients", &source)
            .finish()
    }
}

impl SiumaiOracle {
    /// Create an oracle that builds its clients from `config`.
    ///
    /// No connection is made until the first prompt.
    pub fn from_config(config: LlmConfig) -> Result<Self> {
        config.validate()?;
        if !OracleFactory::supports(&config.provider) {
            return Err(AnalystError::configuration(format!(
                "Unsupported LLM provider: {}",
                config.provider
            )));
        }

        Ok(Self {
            config,
            source: ClientSource::Managed {
                factory: OracleFactory::new(),
                clients: RwLock::new(HashMap::new()),
            },
        })
    }

    /// Wrap an already-built client.
    ///
    /// `config` supplies the model name and timeout; sampling is whatever the
    /// client was built with.
    pub fn with_client(client: Arc<dyn ChatCapability>, config: LlmConfig) -> Self {
        Self {
            config,
            source: ClientSource::Fixed(client),
        }
    }

    /// The configuration this oracle was created from.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn client_for(&self, prompt: &Prompt) -> Result<Arc<dyn ChatCapability>> {
        let (factory, clients) = match &self.source {
            ClientSource::Fixed(client) => return Ok(Arc::clone(client)),
            ClientSource::Managed { factory, clients } => (factory, clients),
        };

        let (temperature, max_tokens) = self.config.sampling(prompt.temperature, prompt.max_tokens);
        let key = (temperature.to_bits(), max_tokens);

        {
            let clients = clients.read().await;
            if let Some(client) = clients.get(&key) {
                return Ok(Arc::clone(client));
            }
        }

        let client = factory
            .create_client(&self.config, temperature, max_tokens)
            .await?;
        let mut clients = clients.write().await;
        let client = clients.entry(key).or_insert(client);
        debug!(
            temperature,
            max_tokens, "Cached LLM client for sampling profile"
        );
        Ok(Arc::clone(client))
    }

    async fn send(&self, client: &dyn ChatCapability, messages: Vec<ChatMessage>) -> Result<String> {
        let timeout = Duration::from_secs(self.config.effective_timeout());
        let response = tokio::time::timeout(timeout, client.chat(messages))
            .await
            .map_err(|_| {
                AnalystError::oracle(format!("request timed out after {}s", timeout.as_secs()))
            })?
            .map_err(|e| AnalystError::oracle(format!("chat request failed: {e}")))?;

        content_text(&response.content)
    }
}

#[async_trait]
impl LanguageModel for SiumaiOracle {
    #[instrument(skip(self, prompt), fields(purpose = %prompt.purpose, model = %self.config.model))]
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let client = self.client_for(prompt).await?;
        let messages = vec![
            ChatMessage::system(prompt.system.clone()).build(),
            ChatMessage::user(prompt.user.clone()).build(),
        ];

        debug!(prompt_chars = prompt.len(), "Sending prompt");
        match self.send(client.as_ref(), messages).await {
            Ok(text) => {
                debug!(response_chars = text.len(), "Received completion");
                Ok(text)
            }
            Err(e) => {
                error!("Oracle call failed: {}", e);
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "SiumaiOracle"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }

    async fn health_check(&self) -> Result<()> {
        let probe = Prompt::new(
            docanalyst_core::PromptPurpose::QueryIntent,
            "Reply with the single word VALID.",
            "Hello, this is a connectivity test.",
        )
        .with_max_tokens(5);
        self.complete(&probe).await.map(|_| ())
    }
}

/// Read the text out of a chat response.
///
/// Multi-modal responses keep their text parts, joined by spaces.
fn content_text(content: &MessageContent) -> Result<String> {
    match content {
        MessageContent::Text(text) => Ok(text.clone()),
        MessageContent::MultiModal(parts) => {
            let texts: Vec<&str> = parts
                .iter()
                .filter_map(|part| match part {
                    siumai::types::ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect();
            if texts.is_empty() {
                Err(AnalystError::oracle("response contained no text"))
            } else {
                Ok(texts.join(" "))
            }
        }
    }
}
