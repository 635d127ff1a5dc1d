//! Summary validation.
//!
//! The local grounding checks run first and short-circuit the oracle when they
//! find a claim the data contradicts. Everything they let through is
//! fact-checked by the oracle, whose prompt tells wording differences apart
//! from factual contradictions.

use std::sync::Arc;
use tracing::{debug, instrument, warn};

use docanalyst_core::{LanguageModel, Result, ResultSet, Verdict};

use crate::grounding::unsupported_claims;
use crate::prompts::PromptBuilder;
use crate::verdict_parser::parse_verdict;

/// Judges candidate summaries against the result set.
#[derive(Debug, Clone)]
pub struct SummaryValidator {
    oracle: Arc<dyn LanguageModel>,
    prompts: Arc<PromptBuilder>,
}

impl SummaryValidator {
    /// Create a validator.
    pub fn new(oracle: Arc<dyn LanguageModel>, prompts: Arc<PromptBuilder>) -> Self {
        Self { oracle, prompts }
    }

    /// Judge `summary`.
    ///
    /// `query` is the executed query text; numbers it contains (a limit, a
    /// threshold) may be repeated in the summary.
    ///
    /// # Errors
    ///
    /// Propagates oracle failures from the fact check.
    #[instrument(skip_all, fields(results = results.len()))]
    pub async fn validate(
        &self,
        question: &str,
        query: &str,
        results: &ResultSet,
        summary: &str,
    ) -> Result<Verdict> {
        if summary.trim().is_empty() {
            return Ok(Verdict::invalid("empty summary"));
        }

        let unsupported = unsupported_claims(summary, results, &[question, query]);
        if !unsupported.is_empty() {
            debug!(?unsupported, "Local grounding check failed");
            return Ok(Verdict::Invalid(unsupported));
        }

        let prompt = self.prompts.summary_grounding(question, results, summary);
        let response = self.oracle.complete(&prompt).await?;
        let verdict = parse_verdict(&response);
        if !verdict.is_valid() {
            warn!(reasons = ?verdict.reasons(), "Summary rejected by fact check");
        }
        Ok(verdict)
    }
}
