//! Run metrics.
//!
//! Counters are lock-free and shared by every run of an orchestrator.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use docanalyst_core::{LanguageModel, Prompt, Result};

use crate::state::TerminalOutcome;

/// Counters collected across runs.
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    runs_started: AtomicU64,
    answered: AtomicU64,
    answered_with_warning: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
    oracle_calls: AtomicU64,
    query_hallucinations: AtomicU64,
    summary_hallucinations: AtomicU64,
    query_retries: AtomicU64,
    summary_retries: AtomicU64,
    executions_ok: AtomicU64,
    executions_failed: AtomicU64,
    execution_micros: AtomicU64,
}

impl WorkflowMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: &TerminalOutcome) {
        let counter = match outcome {
            TerminalOutcome::Answered(_) => &self.answered,
            TerminalOutcome::AnsweredWithWarning { .. } => &self.answered_with_warning,
            TerminalOutcome::Failed { .. } => &self.failed,
            TerminalOutcome::Cancelled { .. } => &self.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_oracle_call(&self) {
        self.oracle_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query_hallucination(&self) {
        self.query_hallucinations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_summary_hallucination(&self) {
        self.summary_hallucinations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_query_retry(&self) {
        self.query_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_summary_retry(&self) {
        self.summary_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_execution(&self, elapsed: Duration, succeeded: bool) {
        if succeeded {
            self.executions_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.executions_failed.fetch_add(1, Ordering::Relaxed);
        }
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.execution_micros.fetch_add(micros, Ordering::Relaxed);
    }

    /// Read all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        MetricsSnapshot {
            runs_started: load(&self.runs_started),
            answered: load(&self.answered),
            answered_with_warning: load(&self.answered_with_warning),
            failed: load(&self.failed),
            cancelled: load(&self.cancelled),
            oracle_calls: load(&self.oracle_calls),
            query_hallucinations: load(&self.query_hallucinations),
            summary_hallucinations: load(&self.summary_hallucinations),
            query_retries: load(&self.query_retries),
            summary_retries: load(&self.summary_retries),
            executions_ok: load(&self.executions_ok),
            executions_failed: load(&self.executions_failed),
            total_execution_time: Duration::from_micros(load(&self.execution_micros)),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.runs_started,
            &self.answered,
            &self.answered_with_warning,
            &self.failed,
            &self.cancelled,
            &self.oracle_calls,
            &self.query_hallucinations,
            &self.summary_hallucinations,
            &self.query_retries,
            &self.summary_retries,
            &self.executions_ok,
            &self.executions_failed,
            &self.execution_micros,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Point-in-time copy of [`WorkflowMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Runs started.
    pub runs_started: u64,
    /// Runs that ended `Answered`.
    pub answered: u64,
    /// Runs that ended `AnsweredWithWarning`.
    pub answered_with_warning: u64,
    /// Runs that ended `Failed`.
    pub failed: u64,
    /// Runs that ended `Cancelled`.
    pub cancelled: u64,
    /// Calls made to the oracle.
    pub oracle_calls: u64,
    /// Query candidates judged invalid.
    pub query_hallucinations: u64,
    /// Summary candidates judged invalid.
    pub summary_hallucinations: u64,
    /// Query regenerations.
    pub query_retries: u64,
    /// Summary regenerations.
    pub summary_retries: u64,
    /// Query executions that returned results.
    pub executions_ok: u64,
    /// Query executions that failed.
    pub executions_failed: u64,
    /// Time spent in the executor.
    pub total_execution_time: Duration,
}

impl MetricsSnapshot {
    /// Runs that reached a terminal outcome.
    pub fn completed_runs(&self) -> u64 {
        self.answered + self.answered_with_warning + self.failed + self.cancelled
    }

    /// Fraction of completed runs that produced an answer (0.0 to 1.0).
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        let total = self.completed_runs();
        if total == 0 {
            0.0
        } else {
            (self.answered + self.answered_with_warning) as f64 / total as f64
        }
    }

    /// Fraction of completed runs that failed (0.0 to 1.0).
    #[allow(clippy::cast_precision_loss)]
    pub fn failure_rate(&self) -> f64 {
        let total = self.completed_runs();
        if total == 0 {
            0.0
        } else {
            self.failed as f64 / total as f64
        }
    }

    /// Mean executor time per execution.
    pub fn average_execution_time(&self) -> Duration {
        let executions = self.executions_ok + self.executions_failed;
        u32::try_from(executions)
            .ok()
            .filter(|&n| n > 0)
            .map_or(Duration::ZERO, |n| self.total_execution_time / n)
    }
}

/// Oracle wrapper that counts every call.
#[derive(Debug)]
pub(crate) struct MeteredOracle {
    inner: Arc<dyn LanguageModel>,
    metrics: Arc<WorkflowMetrics>,
}

impl MeteredOracle {
    pub(crate) fn new(inner: Arc<dyn LanguageModel>, metrics: Arc<WorkflowMetrics>) -> Self {
        Self { inner, metrics }
    }
}

#[async_trait]
impl LanguageModel for MeteredOracle {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        self.metrics.record_oracle_call();
        self.inner.complete(prompt).await
    }

    fn model(&self) -> Option<&str> {
        self.inner.model()
    }

    async fn health_check(&self) -> Result<()> {
        self.inner.health_check().await
    }
}
