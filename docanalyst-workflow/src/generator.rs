//! Oracle-backed candidate generation.
//!
//! Both generators are single-shot: one prompt, one oracle call, one raw
//! candidate. Retries are the orchestrator's business, and the corrective
//! feedback they need is already in the state the prompt is built from.

use std::sync::Arc;
use tracing::{debug, instrument};

use docanalyst_core::{CandidateQuery, LanguageModel, QueryDialect, Result};

use crate::prompts::PromptBuilder;
use crate::state::WorkflowState;

/// Translates a question and schema into a candidate query.
#[derive(Debug, Clone)]
pub struct QueryGenerator {
    oracle: Arc<dyn LanguageModel>,
    dialect: Arc<dyn QueryDialect>,
    prompts: Arc<PromptBuilder>,
}

impl QueryGenerator {
    /// Create a generator.
    pub fn new(
        oracle: Arc<dyn LanguageModel>,
        dialect: Arc<dyn QueryDialect>,
        prompts: Arc<PromptBuilder>,
    ) -> Self {
        Self {
            oracle,
            dialect,
            prompts,
        }
    }

    /// Generate a candidate for the state's question.
    ///
    /// The candidate carries a structural reading when the dialect can parse
    /// it; a parse failure is left for the validator to report.
    ///
    /// # Errors
    ///
    /// Propagates oracle failures.
    #[instrument(skip(self, state), fields(attempt = state.query_retry_count + 1))]
    pub async fn generate(&self, state: &WorkflowState) -> Result<CandidateQuery> {
        let prompt = self.prompts.query_generation(state);
        debug!(prompt_chars = prompt.len(), "Requesting query");

        let raw = self.oracle.complete(&prompt).await?;
        let text = self.dialect.extract_candidate(&raw);
        let candidate = CandidateQuery::new(text);

        match self.dialect.parse(&candidate.text) {
            Ok(parsed) => {
                debug!(
                    collection = %parsed.collection,
                    operation = %parsed.operation,
                    fields = parsed.fields.len(),
                    "Parsed generated query"
                );
                Ok(candidate.with_parsed(parsed))
            }
            Err(e) => {
                debug!(error = %e, "Generated query does not parse");
                Ok(candidate)
            }
        }
    }
}

/// Turns a result set into a natural-language answer.
#[derive(Debug, Clone)]
pub struct SummaryGenerator {
    oracle: Arc<dyn LanguageModel>,
    prompts: Arc<PromptBuilder>,
}

impl SummaryGenerator {
    /// Create a generator.
    pub fn new(oracle: Arc<dyn LanguageModel>, prompts: Arc<PromptBuilder>) -> Self {
        Self { oracle, prompts }
    }

    /// Generate a candidate summary for the state's results.
    ///
    /// # Errors
    ///
    /// Propagates oracle failures.
    #[instrument(skip(self, state), fields(attempt = state.summary_retry_count + 1))]
    pub async fn generate(&self, state: &WorkflowState) -> Result<String> {
        let prompt = self.prompts.summarization(state);
        debug!(purpose = %prompt.purpose, prompt_chars = prompt.len(), "Requesting summary");

        let raw = self.oracle.complete(&prompt).await?;
        Ok(raw.trim().to_string())
    }
}
