//! Configuration for a question run.

use chrono::NaiveDate;
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::{AnalystError, Result};

/// Default retry budget for each validation loop.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Patterns that mark a question as an attempt to smuggle code into the store.
pub const DEFAULT_BLOCKED_PATTERNS: &[&str] = &[
    r"\$where\s*:",
    r"function\s*\(",
    r"eval\s*\(",
    r"db\.(drop|remove|delete)",
    r"db\.admin",
];

/// Limits applied when rendering a result set into a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderLimits {
    /// Maximum number of documents shown.
    pub max_items: usize,

    /// Maximum characters for the whole rendering.
    pub max_chars: usize,

    /// Maximum characters per document.
    pub max_document_chars: usize,
}

impl RenderLimits {
    /// Create render limits.
    pub const fn new(max_items: usize, max_chars: usize, max_document_chars: usize) -> Self {
        Self {
            max_items,
            max_chars,
            max_document_chars,
        }
    }

    /// Limits for summarization prompts.
    pub const fn summarization() -> Self {
        Self::new(20, 3000, 500)
    }

    /// Limits for fact-checking prompts.
    pub const fn grounding() -> Self {
        Self::new(10, 2000, 500)
    }

    fn validate(&self, label: &str) -> Result<()> {
        if self.max_items == 0 || self.max_chars == 0 || self.max_document_chars == 0 {
            return Err(AnalystError::configuration(format!(
                "{label} render limits must be greater than 0"
            )));
        }
        Ok(())
    }
}

/// Configuration of the workflow state machine and its prompts.
///
/// # Examples
///
/// ```rust
/// use docanalyst_core::config::WorkflowConfig;
///
/// let config = WorkflowConfig::new().with_max_query_retries(1);
/// assert_eq!(config.max_query_retries, 1);
/// assert_eq!(config.max_summary_retries, 3);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// How many times a rejected query is regenerated.
    pub max_query_retries: u32,

    /// How many times a rejected summary is regenerated.
    pub max_summary_retries: u32,

    /// Shortest accepted question, in characters.
    pub min_question_chars: usize,

    /// Longest accepted question, in characters.
    pub max_question_chars: usize,

    /// Case-insensitive regexes that reject a question outright.
    pub blocked_patterns: Vec<String>,

    /// Result rendering for summarization prompts.
    pub summary_render: RenderLimits,

    /// Result rendering for fact-checking prompts.
    pub grounding_render: RenderLimits,

    /// Documents shown when displaying results to a caller.
    pub display_limit: usize,

    /// Fixed "current date" for prompts. Defaults to the run's start date.
    pub reference_date: Option<NaiveDate>,
}

impl WorkflowConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the query retry budget.
    #[must_use]
    pub fn with_max_query_retries(mut self, retries: u32) -> Self {
        self.max_query_retries = retries;
        self
    }

    /// Set the summary retry budget.
    #[must_use]
    pub fn with_max_summary_retries(mut self, retries: u32) -> Self {
        self.max_summary_retries = retries;
        self
    }

    /// Set both retry budgets.
    #[must_use]
    pub fn with_max_retries(self, retries: u32) -> Self {
        self.with_max_query_retries(retries)
            .with_max_summary_retries(retries)
    }

    /// Pin the date shown to the oracle.
    #[must_use]
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Add a blocked question pattern.
    #[must_use]
    pub fn with_blocked_pattern<S: Into<String>>(mut self, pattern: S) -> Self {
        self.blocked_patterns.push(pattern.into());
        self
    }

    /// Set the question length bounds.
    #[must_use]
    pub fn with_question_bounds(mut self, min_chars: usize, max_chars: usize) -> Self {
        self.min_question_chars = min_chars;
        self.max_question_chars = max_chars;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.min_question_chars > self.max_question_chars {
            return Err(AnalystError::configuration(format!(
                "min_question_chars ({}) exceeds max_question_chars ({})",
                self.min_question_chars, self.max_question_chars
            )));
        }

        for pattern in &self.blocked_patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    AnalystError::configuration(format!("Invalid blocked pattern '{pattern}': {e}"))
                })?;
        }

        self.summary_render.validate("Summary")?;
        self.grounding_render.validate("Grounding")?;

        if self.display_limit == 0 {
            return Err(AnalystError::configuration(
                "display_limit must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_query_retries: DEFAULT_MAX_RETRIES,
            max_summary_retries: DEFAULT_MAX_RETRIES,
            min_question_chars: 5,
            max_question_chars: 1000,
            blocked_patterns: DEFAULT_BLOCKED_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            summary_render: RenderLimits::summarization(),
            grounding_render: RenderLimits::grounding(),
            display_limit: 50,
            reference_date: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_query_retries, 3);
        assert_eq!(config.max_summary_retries, 3);
        assert_eq!(config.min_question_chars, 5);
        assert_eq!(config.blocked_patterns.len(), 5);
        assert_eq!(config.summary_render, RenderLimits::new(20, 3000, 500));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_pattern_is_rejected() {
        let config = WorkflowConfig::new().with_blocked_pattern("(unclosed");
        assert!(matches!(
            config.validate(),
            Err(AnalystError::Configuration { .. })
        ));
    }

    #[test]
    fn test_inverted_bounds_are_rejected() {
        assert!(WorkflowConfig::new().with_question_bounds(10, 5).validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WorkflowConfig =
            serde_json::from_str(r#"{"max_query_retries": 1, "reference_date": "2024-03-01"}"#)
                .unwrap();
        assert_eq!(config.max_query_retries, 1);
        assert_eq!(config.max_summary_retries, 3);
        assert_eq!(config.reference_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }
}
