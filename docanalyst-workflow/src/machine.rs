//! The workflow state machine.
//!
//! [`transition`] is a pure function from a state and an event to the next
//! state. It calls no collaborator, so every route through the workflow can be
//! driven and checked without an oracle or a store:
//!
//! ```text
//! Start → Validating Input → Generating Query → Validating Query
//!     → {Retry Query → Generating Query | Executing Query}
//!     → Generating Summary → Validating Summary
//!     → {Retry Summary → Generating Summary | Done} → End
//! ```
//!
//! An invalid verdict loops back for another attempt only while the loop's
//! retry counter is below its budget. Once the budget is spent the last
//! candidate goes forward anyway and the final answer is flagged.

use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use docanalyst_core::{
    AnalystError, CandidateQuery, Result, ResultSet, SchemaSnapshot, Verdict,
    config::WorkflowConfig,
};

use crate::state::{
    Answer, FailureCause, Stage, TerminalOutcome, ValidationLoop, ValidationWarning,
    WorkflowState,
};

/// Retry budgets for the two validation loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum query regenerations.
    pub max_query_retries: u32,
    /// Maximum summary regenerations.
    pub max_summary_retries: u32,
}

impl RetryPolicy {
    /// Create a policy.
    pub fn new(max_query_retries: u32, max_summary_retries: u32) -> Self {
        Self {
            max_query_retries,
            max_summary_retries,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&WorkflowConfig::default())
    }
}

impl From<&WorkflowConfig> for RetryPolicy {
    fn from(config: &WorkflowConfig) -> Self {
        Self::new(config.max_query_retries, config.max_summary_retries)
    }
}

/// Something that happened during a run.
#[derive(Debug, Clone)]
pub enum Event {
    /// The run was started.
    Begin,
    /// The question passed validation and the schema was captured.
    InputAccepted {
        /// Normalized question.
        question: String,
        /// Schema snapshot for the whole run.
        schema: Arc<SchemaSnapshot>,
    },
    /// The oracle produced a candidate query.
    QueryGenerated(CandidateQuery),
    /// The query validator reached a verdict.
    QueryJudged(Verdict),
    /// The store returned documents.
    QueryExecuted(Arc<ResultSet>),
    /// The oracle produced a candidate summary.
    SummaryGenerated(String),
    /// The summary validator reached a verdict.
    SummaryJudged(Verdict),
    /// A pending retry is being started.
    RetryScheduled,
    /// The settled answer is being handed back.
    Finish,
    /// The current stage failed.
    Failed(FailureCause),
    /// The caller aborted the run.
    Cancelled,
}

impl Event {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Begin => "Begin",
            Self::InputAccepted { .. } => "InputAccepted",
            Self::QueryGenerated(_) => "QueryGenerated",
            Self::QueryJudged(_) => "QueryJudged",
            Self::QueryExecuted(_) => "QueryExecuted",
            Self::SummaryGenerated(_) => "SummaryGenerated",
            Self::SummaryJudged(_) => "SummaryJudged",
            Self::RetryScheduled => "RetryScheduled",
            Self::Finish => "Finish",
            Self::Failed(_) => "Failed",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Compute the state that follows `state` when `event` happens.
///
/// The input state is left untouched.
///
/// # Errors
///
/// Returns [`AnalystError::Transition`] when the event is not accepted in the
/// current stage.
pub fn transition(
    state: &WorkflowState,
    event: Event,
    policy: &RetryPolicy,
) -> Result<WorkflowState> {
    let stage = state.stage;
    let mut next = state.clone();

    match (stage, event) {
        (Stage::Start, Event::Begin) => {
            next.stage = Stage::ValidatingInput;
        }

        (Stage::ValidatingInput, Event::InputAccepted { question, schema }) => {
            next.validated_question = Some(question);
            next.schema_snapshot = Some(schema);
            next.stage = Stage::GeneratingQuery;
        }

        (Stage::GeneratingQuery, Event::QueryGenerated(query)) => {
            next.candidate_query = Some(query);
            next.stage = Stage::ValidatingQuery;
        }

        (Stage::ValidatingQuery, Event::QueryJudged(verdict)) => {
            let exhausted = state.query_retry_count >= policy.max_query_retries;
            if verdict.is_valid() {
                next.stage = Stage::ExecutingQuery;
            } else if !exhausted {
                next.query_retry_count += 1;
                next.stage = Stage::RetryQuery;
            } else if state
                .candidate_query
                .as_ref()
                .is_none_or(CandidateQuery::is_blank)
            {
                let message = format!(
                    "no query produced after {} retries",
                    state.query_retry_count
                );
                return Ok(fail(next, FailureCause::NothingGenerated(message)));
            } else {
                warn!(
                    retries = state.query_retry_count,
                    reasons = ?verdict.reasons(),
                    "Query retries exhausted, executing last candidate"
                );
                next.stage = Stage::ExecutingQuery;
            }
            next.query_validation_verdict = Some(verdict);
        }

        (Stage::ExecutingQuery, Event::QueryExecuted(results)) => {
            next.result_set = Some(results);
            next.stage = Stage::GeneratingSummary;
        }

        (Stage::GeneratingSummary, Event::SummaryGenerated(summary)) => {
            next.candidate_summary = Some(summary);
            next.stage = Stage::ValidatingSummary;
        }

        (Stage::ValidatingSummary, Event::SummaryJudged(verdict)) => {
            let exhausted = state.summary_retry_count >= policy.max_summary_retries;
            if !verdict.is_valid() && !exhausted {
                next.summary_retry_count += 1;
                next.summary_validation_verdict = Some(verdict);
                next.stage = Stage::RetrySummary;
            } else {
                next.summary_validation_verdict = Some(verdict);
                return settle(next);
            }
        }

        (Stage::RetryQuery, Event::RetryScheduled) => {
            next.stage = Stage::GeneratingQuery;
        }

        (Stage::RetrySummary, Event::RetryScheduled) => {
            next.stage = Stage::GeneratingSummary;
        }

        (Stage::Done, Event::Finish) => {
            next.stage = Stage::End;
        }

        (stage, Event::Failed(cause)) if stage.is_cancellable() => {
            return Ok(fail(next, cause));
        }

        (stage, Event::Cancelled) if stage.is_cancellable() => {
            next.terminal_outcome = Some(TerminalOutcome::Cancelled { stage });
            next.stage = Stage::End;
        }

        (stage, event) => return Err(AnalystError::transition(stage, event.name())),
    }

    debug!(from = %stage, to = %next.stage, "Workflow transition");
    Ok(next)
}

fn fail(mut state: WorkflowState, cause: FailureCause) -> WorkflowState {
    state.terminal_outcome = Some(TerminalOutcome::Failed {
        stage: state.stage,
        cause,
    });
    state.stage = Stage::End;
    state
}

/// Enter `Done`, deciding between a clean and a flagged answer.
fn settle(mut state: WorkflowState) -> Result<WorkflowState> {
    let summary = state.candidate_summary.clone().unwrap_or_default();
    if summary.trim().is_empty() {
        let message = format!(
            "no summary produced after {} retries",
            state.summary_retry_count
        );
        return Ok(fail(state, FailureCause::NothingGenerated(message)));
    }

    let (Some(query), Some(result_set)) = (state.candidate_query.clone(), state.result_set.clone())
    else {
        return Err(AnalystError::internal(
            "summary settled without an executed query",
        ));
    };

    let mut warnings = Vec::new();
    if let Some(Verdict::Invalid(reasons)) = &state.query_validation_verdict {
        warnings.push(ValidationWarning {
            stage: ValidationLoop::Query,
            retries: state.query_retry_count,
            reasons: reasons.clone(),
        });
    }
    if let Some(Verdict::Invalid(reasons)) = &state.summary_validation_verdict {
        warn!(
            retries = state.summary_retry_count,
            ?reasons,
            "Summary retries exhausted, accepting last candidate"
        );
        warnings.push(ValidationWarning {
            stage: ValidationLoop::Summary,
            retries: state.summary_retry_count,
            reasons: reasons.clone(),
        });
    }

    let answer = Answer {
        summary,
        query,
        result_set,
    };
    state.terminal_outcome = Some(if warnings.is_empty() {
        TerminalOutcome::Answered(answer)
    } else {
        TerminalOutcome::AnsweredWithWarning { answer, warnings }
    });
    state.stage = Stage::Done;
    Ok(state)
}
