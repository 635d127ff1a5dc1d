//! Question validation.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use docanalyst_core::{AnalystError, Result, config::WorkflowConfig};

/// Rejects empty, out-of-bounds and unsafe questions before any collaborator
/// is called, and normalizes the rest.
#[derive(Debug, Clone)]
pub struct InputValidator {
    min_chars: usize,
    max_chars: usize,
    blocked: Vec<Regex>,
}

impl InputValidator {
    /// Build a validator from the workflow configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a blocked pattern is not a valid regex.
    pub fn new(config: &WorkflowConfig) -> Result<Self> {
        let blocked = config
            .blocked_patterns
            .iter()
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        AnalystError::configuration(format!(
                            "Invalid blocked pattern '{pattern}': {e}"
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            min_chars: config.min_question_chars,
            max_chars: config.max_question_chars,
            blocked,
        })
    }

    /// Validate a question and return it with whitespace collapsed.
    ///
    /// # Errors
    ///
    /// Returns [`AnalystError::InvalidInput`] describing why the question was
    /// rejected.
    pub fn validate(&self, question: &str) -> Result<String> {
        let normalized = question.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.is_empty() {
            return Err(AnalystError::invalid_input(
                "Question cannot be empty. Please provide a question about your data.",
            ));
        }

        let length = normalized.chars().count();
        if length < self.min_chars {
            warn!(length, "Question too short");
            return Err(AnalystError::invalid_input(
                "Question is too short. Please provide more details.",
            ));
        }
        if length > self.max_chars {
            warn!(length, "Question too long");
            return Err(AnalystError::invalid_input(format!(
                "Question is too long ({length} characters, at most {} allowed).",
                self.max_chars
            )));
        }

        if let Some(pattern) = self.blocked.iter().find(|p| p.is_match(&normalized)) {
            warn!(pattern = pattern.as_str(), "Potentially unsafe pattern detected");
            return Err(AnalystError::invalid_input(
                "Question contains potentially unsafe content.",
            ));
        }

        Ok(normalized)
    }
}
