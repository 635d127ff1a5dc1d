//! Prompts sent to the language-model oracle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a prompt is being sent.
///
/// Oracle implementations may ignore this; it exists for logging, metrics and
/// for deterministic test doubles that answer per purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptPurpose {
    /// Translate the question into a query.
    QueryGeneration,
    /// Ask whether a query plausibly answers the question.
    QueryIntent,
    /// Turn results into an answer.
    Summarization,
    /// Explain that nothing matched.
    EmptySummarization,
    /// Fact-check a summary against results.
    SummaryGrounding,
}

impl PromptPurpose {
    /// Stable identifier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::QueryGeneration => "query_generation",
            Self::QueryIntent => "query_intent",
            Self::Summarization => "summarization",
            Self::EmptySummarization => "empty_summarization",
            Self::SummaryGrounding => "summary_grounding",
        }
    }
}

impl fmt::Display for PromptPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A complete request to the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Why the prompt is sent.
    pub purpose: PromptPurpose,

    /// System instruction.
    pub system: String,

    /// User message.
    pub user: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl Prompt {
    /// Create a prompt with default sampling settings.
    pub fn new(purpose: PromptPurpose, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            purpose,
            system: system.into(),
            user: user.into(),
            temperature: 0.1,
            max_tokens: 1000,
        }
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the token budget.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Total characters sent, for logging.
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    /// Whether both parts are empty.
    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}
