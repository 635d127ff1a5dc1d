//! The workflow orchestrator.
//!
//! The orchestrator drives [`transition`] with events produced by calling the
//! collaborators for the current stage. It owns no run state of its own, so a
//! single instance serves any number of concurrent runs.

use std::sync::Arc;
use std::time::Instant;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};
use uuid::Uuid;

use docanalyst_core::{
    AnalystError, LanguageModel, QueryDialect, QueryExecutor, Result, SchemaProvider, Verdict,
    config::WorkflowConfig,
};

use crate::generator::{QueryGenerator, SummaryGenerator};
use crate::input::InputValidator;
use crate::machine::{Event, RetryPolicy, transition};
use crate::metrics::{MeteredOracle, MetricsSnapshot, WorkflowMetrics};
use crate::prompts::PromptBuilder;
use crate::query_validator::QueryValidator;
use crate::render::render_for_display;
use crate::state::{FailureCause, Stage, TerminalOutcome, WorkflowState};
use crate::summary_validator::SummaryValidator;

/// The result of one run.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    /// How the run ended.
    pub outcome: TerminalOutcome,

    /// The final state.
    pub state: WorkflowState,

    /// Every stage visited, in order, starting with `Start`.
    pub trace: Vec<Stage>,
}

impl WorkflowRun {
    /// Whether the run produced an answer, flagged or not.
    pub fn is_answered(&self) -> bool {
        self.outcome.answer().is_some()
    }

    /// Render the outcome for a person to read.
    pub fn report(&self, display_limit: usize) -> String {
        match &self.outcome {
            TerminalOutcome::Answered(answer) => format!(
                "{}\n\n{}",
                answer.summary,
                render_for_display(
                    &answer.result_set,
                    self.state.effective_question(),
                    &answer.query.text,
                    display_limit
                )
            ),
            TerminalOutcome::AnsweredWithWarning { answer, warnings } => {
                let notes = warnings
                    .iter()
                    .map(|w| format!("Warning: {w}"))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "{}\n\n{notes}\n\n{}",
                    answer.summary,
                    render_for_display(
                        &answer.result_set,
                        self.state.effective_question(),
                        &answer.query.text,
                        display_limit
                    )
                )
            }
            TerminalOutcome::Failed { stage, cause } => {
                format!("Error during {stage}: {}", cause.message())
            }
            TerminalOutcome::Cancelled { stage } => format!("Cancelled during {stage}."),
        }
    }
}

/// Runs questions through the workflow.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    schema_provider: Arc<dyn SchemaProvider>,
    executor: Arc<dyn QueryExecutor>,
    oracle: Arc<dyn LanguageModel>,
    input: InputValidator,
    query_generator: QueryGenerator,
    query_validator: QueryValidator,
    summary_generator: SummaryGenerator,
    summary_validator: SummaryValidator,
    policy: RetryPolicy,
    config: WorkflowConfig,
    metrics: Arc<WorkflowMetrics>,
}

impl Orchestrator {
    /// Start building an orchestrator.
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Answer `question`.
    ///
    /// # Errors
    ///
    /// Collaborator failures are reported in the run's outcome, not here. An
    /// error means the workflow itself broke an invariant.
    pub async fn run(&self, question: &str) -> Result<WorkflowRun> {
        self.run_with_cancellation(question, CancellationToken::new())
            .await
    }

    /// Answer `question`, stopping as soon as `cancel` fires.
    ///
    /// Once cancelled, no further oracle or executor call is started, and the
    /// run ends `Cancelled` unless an answer was already settled.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::run`].
    pub async fn run_with_cancellation(
        &self,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<WorkflowRun> {
        let run_id = Uuid::new_v4();
        let span = info_span!("workflow_run", %run_id);
        self.drive(run_id, question, cancel).instrument(span).await
    }

    /// Counters across all runs so far.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Zero the counters.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// The retry budgets in force.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Check that the oracle and the store are reachable.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator's error.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        self.oracle.health_check().await?;
        self.executor.health_check().await?;
        self.schema_provider.schema().await?;
        info!("Health check passed");
        Ok(())
    }

    async fn drive(
        &self,
        run_id: Uuid,
        question: &str,
        cancel: CancellationToken,
    ) -> Result<WorkflowRun> {
        let as_of = self
            .config
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        let mut state = WorkflowState::new(run_id, question, as_of);
        let mut trace = vec![state.stage];

        self.metrics.record_run_started();
        info!("Workflow started");

        while !state.stage.is_terminal() {
            let event = if cancel.is_cancelled() && state.stage.is_cancellable() {
                Event::Cancelled
            } else {
                tokio::select! {
                    biased;
                    () = cancel.cancelled(), if state.stage.is_cancellable() => Event::Cancelled,
                    event = self.step(&state) => event,
                }
            };

            let next = transition(&state, event.clone(), &self.policy)?;
            self.observe(&state, &event, &next);
            trace.push(next.stage);
            state = next;
        }

        let outcome = state
            .terminal_outcome
            .clone()
            .ok_or_else(|| AnalystError::internal("run ended without an outcome"))?;
        self.metrics.record_outcome(&outcome);

        match &outcome {
            TerminalOutcome::Failed { stage, cause } => {
                error!(%stage, kind = cause.kind(), cause = cause.message(), "Workflow failed");
            }
            other => info!(
                outcome = other.label(),
                query_retries = state.query_retry_count,
                summary_retries = state.summary_retry_count,
                "Workflow finished"
            ),
        }

        Ok(WorkflowRun {
            outcome,
            state,
            trace,
        })
    }

    /// Call the collaborators for the current stage and report what happened.
    async fn step(&self, state: &WorkflowState) -> Event {
        match state.stage {
            Stage::Start => Event::Begin,
            Stage::ValidatingInput => self.validate_input(state).await,
            Stage::GeneratingQuery => match self.query_generator.generate(state).await {
                Ok(query) => Event::QueryGenerated(query),
                Err(e) => failed(&e),
            },
            Stage::ValidatingQuery => {
                let (Some(candidate), Some(schema)) =
                    (&state.candidate_query, &state.schema_snapshot)
                else {
                    return missing("candidate query");
                };
                match self
                    .query_validator
                    .validate(state.effective_question(), candidate, schema)
                    .await
                {
                    Ok(verdict) => Event::QueryJudged(verdict),
                    Err(e) => failed(&e),
                }
            }
            Stage::RetryQuery | Stage::RetrySummary => Event::RetryScheduled,
            Stage::ExecutingQuery => self.execute(state).await,
            Stage::GeneratingSummary => match self.summary_generator.generate(state).await {
                Ok(summary) => Event::SummaryGenerated(summary),
                Err(e) => failed(&e),
            },
            Stage::ValidatingSummary => {
                let (Some(summary), Some(results), Some(query)) = (
                    &state.candidate_summary,
                    &state.result_set,
                    &state.candidate_query,
                ) else {
                    return missing("candidate summary");
                };
                match self
                    .summary_validator
                    .validate(state.effective_question(), &query.text, results, summary)
                    .await
                {
                    Ok(verdict) => Event::SummaryJudged(verdict),
                    Err(e) => failed(&e),
                }
            }
            Stage::Done => Event::Finish,
            Stage::End => missing("a stage after End"),
        }
    }

    async fn validate_input(&self, state: &WorkflowState) -> Event {
        let question = match self.input.validate(&state.question) {
            Ok(question) => question,
            Err(e) => return Event::Failed(FailureCause::from(&e)),
        };

        match self.schema_provider.schema().await {
            Ok(schema) => {
                debug!(collections = schema.len(), "Captured schema snapshot");
                Event::InputAccepted {
                    question,
                    schema: Arc::new(schema),
                }
            }
            Err(e) => failed(&e),
        }
    }

    async fn execute(&self, state: &WorkflowState) -> Event {
        let Some(candidate) = &state.candidate_query else {
            return missing("query to execute");
        };

        let started = Instant::now();
        let result = self.executor.execute(candidate).await;
        self.metrics
            .record_execution(started.elapsed(), result.is_ok());

        match result {
            Ok(results) => {
                info!(documents = results.len(), "Query executed");
                Event::QueryExecuted(Arc::new(results))
            }
            Err(e) => failed(&e),
        }
    }

    fn observe(&self, before: &WorkflowState, event: &Event, after: &WorkflowState) {
        match event {
            Event::QueryJudged(Verdict::Invalid(_)) => self.metrics.record_query_hallucination(),
            Event::SummaryJudged(Verdict::Invalid(_)) => {
                self.metrics.record_summary_hallucination();
            }
            _ => {}
        }
        match after.stage {
            Stage::RetryQuery => {
                self.metrics.record_query_retry();
                warn!(attempt = after.query_retry_count, "Retrying query generation");
            }
            Stage::RetrySummary => {
                self.metrics.record_summary_retry();
                warn!(attempt = after.summary_retry_count, "Retrying summary generation");
            }
            _ => {}
        }
        if before.stage != after.stage {
            info!(from = %before.stage, to = %after.stage, event = event.name(), "Stage changed");
        }
    }
}

fn failed(error: &AnalystError) -> Event {
    error!(error = %error, "Collaborator call failed");
    Event::Failed(FailureCause::from(error))
}

fn missing(what: &str) -> Event {
    Event::Failed(FailureCause::Internal(format!("state has no {what}")))
}

/// Builder for [`Orchestrator`].
#[derive(Debug, Default)]
pub struct OrchestratorBuilder {
    oracle: Option<Arc<dyn LanguageModel>>,
    dialect: Option<Arc<dyn QueryDialect>>,
    schema_provider: Option<Arc<dyn SchemaProvider>>,
    executor: Option<Arc<dyn QueryExecutor>>,
    config: Option<WorkflowConfig>,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl OrchestratorBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language-model oracle.
    #[must_use]
    pub fn oracle(mut self, oracle: Arc<dyn LanguageModel>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Set the query dialect.
    #[must_use]
    pub fn dialect(mut self, dialect: Arc<dyn QueryDialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Set the schema snapshot provider.
    #[must_use]
    pub fn schema_provider(mut self, provider: Arc<dyn SchemaProvider>) -> Self {
        self.schema_provider = Some(provider);
        self
    }

    /// Set the query executor.
    #[must_use]
    pub fn executor(mut self, executor: Arc<dyn QueryExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Set the workflow configuration.
    #[must_use]
    pub fn config(mut self, config: WorkflowConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Share metrics with other orchestrators.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a collaborator is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<Orchestrator> {
        let oracle = self
            .oracle
            .ok_or_else(|| AnalystError::configuration("Oracle is required"))?;
        let dialect = self
            .dialect
            .ok_or_else(|| AnalystError::configuration("Query dialect is required"))?;
        let schema_provider = self
            .schema_provider
            .ok_or_else(|| AnalystError::configuration("Schema provider is required"))?;
        let executor = self
            .executor
            .ok_or_else(|| AnalystError::configuration("Query executor is required"))?;

        let config = self.config.unwrap_or_default();
        config.validate()?;

        let metrics = self.metrics.unwrap_or_default();
        let oracle: Arc<dyn LanguageModel> =
            Arc::new(MeteredOracle::new(oracle, Arc::clone(&metrics)));
        let prompts = Arc::new(PromptBuilder::new(Arc::clone(&dialect), &config));

        info!(
            oracle = oracle.name(),
            dialect = dialect.language(),
            max_query_retries = config.max_query_retries,
            max_summary_retries = config.max_summary_retries,
            "Building orchestrator"
        );

        Ok(Orchestrator {
            input: InputValidator::new(&config)?,
            query_generator: QueryGenerator::new(
                Arc::clone(&oracle),
                Arc::clone(&dialect),
                Arc::clone(&prompts),
            ),
            query_validator: QueryValidator::new(
                Arc::clone(&oracle),
                dialect,
                Arc::clone(&prompts),
            ),
            summary_generator: SummaryGenerator::new(Arc::clone(&oracle), Arc::clone(&prompts)),
            summary_validator: SummaryValidator::new(Arc::clone(&oracle), prompts),
            policy: RetryPolicy::from(&config),
            schema_provider,
            executor,
            oracle,
            config,
            metrics,
        })
    }
}
