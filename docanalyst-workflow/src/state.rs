//! Workflow state and terminal outcomes.
//!
//! A [`WorkflowState`] is created per question and threaded through every
//! step of the run. It is never mutated in place: each transition produces a
//! new value, so retry loops and concurrent runs share nothing mutable.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use docanalyst_core::{AnalystError, CandidateQuery, ResultSet, SchemaSnapshot, Verdict};

/// The stages of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    /// Nothing has happened yet.
    Start,
    /// Checking the question and capturing the schema snapshot.
    ValidatingInput,
    /// Asking the oracle for a query.
    GeneratingQuery,
    /// Checking the candidate query.
    ValidatingQuery,
    /// A rejected query is about to be regenerated.
    RetryQuery,
    /// Running the query against the store.
    ExecutingQuery,
    /// Asking the oracle for a summary.
    GeneratingSummary,
    /// Fact-checking the candidate summary.
    ValidatingSummary,
    /// A rejected summary is about to be regenerated.
    RetrySummary,
    /// An answer has been settled.
    Done,
    /// The run is over.
    End,
}

impl Stage {
    /// Whether the run is over.
    pub fn is_terminal(self) -> bool {
        self == Self::End
    }

    /// Whether a caller's cancellation still has an effect in this stage.
    ///
    /// Once an answer is settled there is nothing left to abort.
    pub fn is_cancellable(self) -> bool {
        !matches!(self, Self::Done | Self::End)
    }

    /// Human-readable name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::ValidatingInput => "Validating Input",
            Self::GeneratingQuery => "Generating Query",
            Self::ValidatingQuery => "Validating Query",
            Self::RetryQuery => "Retry Query",
            Self::ExecutingQuery => "Executing Query",
            Self::GeneratingSummary => "Generating Summary",
            Self::ValidatingSummary => "Validating Summary",
            Self::RetrySummary => "Retry Summary",
            Self::Done => "Done",
            Self::End => "End",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum FailureCause {
    /// The question was rejected before any collaborator call.
    InvalidInput(String),
    /// The document store could not be reached.
    Connectivity(String),
    /// The language-model oracle failed.
    Oracle(String),
    /// The store rejected or failed to run the query.
    Execution(String),
    /// Every generation attempt produced nothing usable.
    NothingGenerated(String),
    /// An internal invariant was broken.
    Internal(String),
}

impl FailureCause {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Connectivity(_) => "connectivity",
            Self::Oracle(_) => "oracle",
            Self::Execution(_) => "execution",
            Self::NothingGenerated(_) => "nothing_generated",
            Self::Internal(_) => "internal",
        }
    }

    /// The underlying message.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(m)
            | Self::Connectivity(m)
            | Self::Oracle(m)
            | Self::Execution(m)
            | Self::NothingGenerated(m)
            | Self::Internal(m) => m,
        }
    }
}

impl From<&AnalystError> for FailureCause {
    fn from(error: &AnalystError) -> Self {
        match error {
            AnalystError::InvalidInput { message } => Self::InvalidInput(message.clone()),
            AnalystError::Connectivity { message } => Self::Connectivity(message.clone()),
            AnalystError::Oracle { .. } | AnalystError::RateLimit => {
                Self::Oracle(error.to_string())
            }
            AnalystError::Execution { message } => Self::Execution(message.clone()),
            AnalystError::Syntax { .. } => Self::Execution(error.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

/// Which validation loop ran out of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLoop {
    /// Query generation and validation.
    Query,
    /// Summary generation and validation.
    Summary,
}

impl fmt::Display for ValidationLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Summary => "summary",
        })
    }
}

/// A validation loop that gave up and let its last candidate through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    /// The loop that was exhausted.
    pub stage: ValidationLoop,

    /// Retries spent before giving up.
    pub retries: u32,

    /// Reasons the last candidate was rejected.
    pub reasons: Vec<String>,
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} could not be verified after {} retries: {}",
            self.stage,
            self.retries,
            self.reasons.join("; ")
        )
    }
}

/// The parts of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Natural-language answer.
    pub summary: String,

    /// The query that produced the results.
    pub query: CandidateQuery,

    /// Documents the query returned.
    pub result_set: Arc<ResultSet>,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalOutcome {
    /// Both the query and the summary passed validation.
    Answered(Answer),

    /// An answer was produced, but at least one validation loop gave up.
    AnsweredWithWarning {
        /// The best-effort answer.
        answer: Answer,
        /// One warning per exhausted loop.
        warnings: Vec<ValidationWarning>,
    },

    /// A collaborator failed or the question was rejected.
    Failed {
        /// Stage in which the failure happened.
        stage: Stage,
        /// What went wrong.
        cause: FailureCause,
    },

    /// The caller aborted the run.
    Cancelled {
        /// Stage the run was in when it was aborted.
        stage: Stage,
    },
}

impl TerminalOutcome {
    /// The answer, when the run produced one.
    pub fn answer(&self) -> Option<&Answer> {
        match self {
            Self::Answered(answer) | Self::AnsweredWithWarning { answer, .. } => Some(answer),
            Self::Failed { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// Whether the answer carries a warning flag.
    pub fn has_warning(&self) -> bool {
        matches!(self, Self::AnsweredWithWarning { .. })
    }

    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Answered(_) => "answered",
            Self::AnsweredWithWarning { .. } => "answered_with_warning",
            Self::Failed { .. } => "failed",
            Self::Cancelled { .. } => "cancelled",
        }
    }
}

/// The record threaded through one run.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowState {
    /// Identifier shared by every log line of the run.
    pub run_id: Uuid,

    /// The question exactly as asked.
    pub question: String,

    /// The question after input validation (trimmed, whitespace collapsed).
    pub validated_question: Option<String>,

    /// Date shown to the oracle as "today".
    pub as_of: NaiveDate,

    /// Current stage.
    pub stage: Stage,

    /// Schema captured once, during input validation.
    #[serde(skip)]
    pub schema_snapshot: Option<Arc<SchemaSnapshot>>,

    /// The query under consideration.
    pub candidate_query: Option<CandidateQuery>,

    /// Number of query regenerations so far.
    pub query_retry_count: u32,

    /// Verdict on the current candidate query.
    pub query_validation_verdict: Option<Verdict>,

    /// Documents returned by execution.
    #[serde(skip)]
    pub result_set: Option<Arc<ResultSet>>,

    /// The summary under consideration.
    pub candidate_summary: Option<String>,

    /// Number of summary regenerations so far.
    pub summary_retry_count: u32,

    /// Verdict on the current candidate summary.
    pub summary_validation_verdict: Option<Verdict>,

    /// Set once the run reaches `Done` or fails.
    pub terminal_outcome: Option<TerminalOutcome>,
}

impl WorkflowState {
    /// Create the initial state for a question.
    pub fn new(run_id: Uuid, question: impl Into<String>, as_of: NaiveDate) -> Self {
        Self {
            run_id,
            question: question.into(),
            validated_question: None,
            as_of,
            stage: Stage::Start,
            schema_snapshot: None,
            candidate_query: None,
            query_retry_count: 0,
            query_validation_verdict: None,
            result_set: None,
            candidate_summary: None,
            summary_retry_count: 0,
            summary_validation_verdict: None,
            terminal_outcome: None,
        }
    }

    /// The question as the oracle sees it.
    pub fn effective_question(&self) -> &str {
        self.validated_question.as_deref().unwrap_or(&self.question)
    }

    /// The rejected query and its reasons, when the next generation is a retry.
    pub fn query_feedback(&self) -> Option<(&CandidateQuery, &[String])> {
        match (&self.candidate_query, &self.query_validation_verdict) {
            (Some(query), Some(Verdict::Invalid(reasons))) if self.query_retry_count > 0 => {
                Some((query, reasons))
            }
            _ => None,
        }
    }

    /// The rejected summary and its reasons, when the next generation is a retry.
    pub fn summary_feedback(&self) -> Option<(&str, &[String])> {
        match (&self.candidate_summary, &self.summary_validation_verdict) {
            (Some(summary), Some(Verdict::Invalid(reasons))) if self.summary_retry_count > 0 => {
                Some((summary, reasons))
            }
            _ => None,
        }
    }
}
