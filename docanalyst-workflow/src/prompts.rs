//! Prompt construction.
//!
//! Every prompt is a pure function of its inputs: the same state always yields
//! the same text. The reference date comes from the state, never the clock.

use std::sync::Arc;

use docanalyst_core::{
    CandidateQuery, Prompt, PromptPurpose, QueryDialect, ResultSet, SchemaSnapshot,
    config::{RenderLimits, WorkflowConfig},
};

use crate::render::{render_results, render_schema};
use crate::state::WorkflowState;

/// Sampling for query generation and both validators.
pub const PRECISE_TEMPERATURE: f32 = 0.1;
/// Sampling for summaries.
pub const SUMMARY_TEMPERATURE: f32 = 0.3;

const QUERY_MAX_TOKENS: u32 = 1000;
const SUMMARY_MAX_TOKENS: u32 = 500;
const SHORT_MAX_TOKENS: u32 = 200;

const VERDICT_FORMAT: &str = "Respond with ONLY \"VALID\" on the first line if there is no problem. \
Otherwise respond with \"INVALID: <reason>\" on the first line and put any further reasons on \
their own lines.";

/// Builds the prompts sent to the oracle.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    dialect: Arc<dyn QueryDialect>,
    summary_limits: RenderLimits,
    grounding_limits: RenderLimits,
}

impl PromptBuilder {
    /// Create a builder for `dialect`.
    pub fn new(dialect: Arc<dyn QueryDialect>, config: &WorkflowConfig) -> Self {
        Self {
            dialect,
            summary_limits: config.summary_render,
            grounding_limits: config.grounding_render,
        }
    }

    /// The query-authoring prompt, with corrective feedback on a retry.
    pub fn query_generation(&self, state: &WorkflowState) -> Prompt {
        let language = self.dialect.language();
        let schema = state
            .schema_snapshot
            .as_deref()
            .map_or_else(|| "Schema information not available.".to_string(), render_schema);

        let mut user = format!(
            "You are an expert data analyst experienced at using {language}.\n\
             Your job is to take information about a database plus a natural language question \
             and generate a {language} query to execute to retrieve the information needed to \
             answer the question.\n"
        );

        let tips = self.dialect.authoring_tips();
        if !tips.is_empty() {
            user.push_str("\nSome general query-authoring tips:\n\n");
            for (i, tip) in tips.iter().enumerate() {
                user.push_str(&format!("{}. {tip}\n", i + 1));
            }
        }

        user.push_str(&format!(
            "\nDATABASE SCHEMA INFORMATION:\n{schema}\n\n\
             CURRENT DATE: {}\n\n\
             USER QUESTION:\n{}\n",
            state.as_of.format("%Y-%m-%d"),
            state.effective_question()
        ));

        if let Some((rejected, reasons)) = state.query_feedback() {
            user.push_str(&format!(
                "\nYOUR PREVIOUS QUERY WAS REJECTED:\n{}\n\nProblems found:\n{}\n\
                 Write a corrected query that fixes every problem listed above.\n",
                if rejected.is_blank() { "(empty)" } else { rejected.text.as_str() },
                bullet_list(reasons)
            ));
        }

        user.push_str(&format!(
            "\nGenerate ONLY the {language} query. Do not include any explanation or additional \
             text. The query should be executable as-is."
        ));

        Prompt::new(
            PromptPurpose::QueryGeneration,
            format!(
                "You are a {language} query expert. Generate precise queries based on user questions."
            ),
            user,
        )
        .with_temperature(PRECISE_TEMPERATURE)
        .with_max_tokens(QUERY_MAX_TOKENS)
    }

    /// Ask whether a structurally sound query answers the question.
    pub fn query_intent(
        &self,
        question: &str,
        query: &CandidateQuery,
        schema: &SchemaSnapshot,
    ) -> Prompt {
        let operation = query.parsed.as_ref().map_or_else(String::new, |parsed| {
            format!(
                "\nQUERY OPERATION:\n{} on collection '{}' ({})\n",
                parsed.operation,
                parsed.collection,
                parsed.operation.describe()
            )
        });

        let user = format!(
            "You are a {language} query validator. The query below already references only \
             collections and fields that exist. Your task is to check whether it answers the \
             user's question.\n\n\
             DATABASE SCHEMA:\n{schema}\n\n\
             USER'S QUESTION:\n{question}\n\n\
             GENERATED QUERY:\n{query}\n{operation}\n\
             Check if the query:\n\
             1. Performs the kind of operation the question asks for (filtering, counting, \
             grouping, sorting)\n\
             2. Filters on the values the question mentions\n\
             3. Returns the information needed to answer the question\n\n\
             {VERDICT_FORMAT}",
            language = self.dialect.language(),
            schema = render_schema(schema),
        );

        Prompt::new(
            PromptPurpose::QueryIntent,
            "You are a query validator. Judge whether queries match the intent of the question.",
            user,
        )
        .with_temperature(PRECISE_TEMPERATURE)
        .with_max_tokens(SHORT_MAX_TOKENS)
    }

    /// The answer-writing prompt, with corrective feedback on a retry.
    ///
    /// An empty result set gets a dedicated, shorter prompt.
    pub fn summarization(&self, state: &WorkflowState) -> Prompt {
        let question = state.effective_question();
        let query = state
            .candidate_query
            .as_ref()
            .map_or("", |query| query.text.as_str());
        let feedback = state.summary_feedback().map_or_else(String::new, |(rejected, reasons)| {
            format!(
                "\n\nYOUR PREVIOUS ANSWER WAS REJECTED:\n{rejected}\n\nProblems found:\n{}\n\
                 Write a corrected answer that only states facts present in the results.",
                bullet_list(reasons)
            )
        });

        let empty = state.result_set.as_deref().is_none_or(ResultSet::is_empty);
        if empty {
            let user = format!(
                "The user asked: \"{question}\"\n\n\
                 The query executed was: {query}\n\n\
                 However, no results were found matching the query criteria.\n\n\
                 Provide a helpful, natural language response explaining that no data was found \
                 matching their question.{feedback}"
            );
            return Prompt::new(
                PromptPurpose::EmptySummarization,
                "You are a helpful data analyst assistant.",
                user,
            )
            .with_temperature(SUMMARY_TEMPERATURE)
            .with_max_tokens(SHORT_MAX_TOKENS);
        }

        let results = state
            .result_set
            .as_deref()
            .map(|results| render_results(results, self.summary_limits))
            .unwrap_or_default();

        let user = format!(
            "You are a helpful data analyst assistant. Your task is to analyze query results and \
             provide a clear, natural language answer to the user's question.\n\n\
             USER'S QUESTION:\n{question}\n\n\
             QUERY RESULTS:\n{results}\n\n\
             QUERY USED:\n{query}\n\n\
             Based on the query results above, provide a clear and concise answer to the user's \
             question.\n\
             - Summarize the key findings in a natural, conversational way.\n\
             - Include specific numbers, names, or data points from the results when relevant.\n\
             - Only state facts that appear in the results.\n\
             - Be concise but informative.\n\
             - Do not include the raw query or technical details unless specifically asked.\
             {feedback}\n\n\
             Your answer:"
        );

        Prompt::new(
            PromptPurpose::Summarization,
            "You are a helpful data analyst assistant. Provide clear, natural language summaries \
             of query results.",
            user,
        )
        .with_temperature(SUMMARY_TEMPERATURE)
        .with_max_tokens(SUMMARY_MAX_TOKENS)
    }

    /// The fact-checking prompt for a candidate summary.
    pub fn summary_grounding(&self, question: &str, results: &ResultSet, summary: &str) -> Prompt {
        let user = format!(
            "You are a fact-checker. Your task is to verify that the summary is supported by the \
             query results.\n\n\
             USER'S QUESTION:\n{question}\n\n\
             QUERY RESULTS:\n{results}\n\n\
             GENERATED SUMMARY:\n{summary}\n\n\
             Check every concrete claim in the summary (numbers, names, dates, categories):\n\
             1. Each claim must be traceable to values in the results, or derivable from them \
             (for example, a count of the results).\n\
             2. Names and identifiers must appear in the results.\n\
             3. Wording differences are acceptable: paraphrase, spelled-out numbers (\"seven\" \
             for 7), rounding and unit conversions consistent with the data are NOT errors.\n\
             4. Only factual contradictions or claims with no support in the data are errors.\n\n\
             {VERDICT_FORMAT} List each unsupported claim as a reason.",
            results = render_results(results, self.grounding_limits),
        );

        Prompt::new(
            PromptPurpose::SummaryGrounding,
            "You are a fact-checker. Verify summaries against actual data for accuracy.",
            user,
        )
        .with_temperature(PRECISE_TEMPERATURE)
        .with_max_tokens(SHORT_MAX_TOKENS)
    }
}

fn bullet_list(items: &[String]) -> String {
    items.iter().map(|item| format!("- {item}\n")).collect()
}
