//! The question-answering workflow for DocAnalyst.
//!
//! This crate turns a natural-language question into a validated answer by
//! sequencing calls to three collaborators: a language-model oracle, a schema
//! snapshot provider and a query executor. It includes:
//!
//! - **State machine**: a pure transition function over an immutable state
//! - **Generators**: oracle-backed query and summary generation
//! - **Validators**: schema/syntax/intent checks for queries, grounding checks
//!   for summaries
//! - **Orchestrator**: drives runs, applies retry budgets, honors cancellation
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docanalyst_workflow::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     oracle: Arc<dyn LanguageModel>,
//! #     dialect: Arc<dyn QueryDialect>,
//! #     schema: Arc<dyn SchemaProvider>,
//! #     executor: Arc<dyn QueryExecutor>,
//! # ) -> Result<()> {
//! let orchestrator = Orchestrator::builder()
//!     .oracle(oracle)
//!     .dialect(dialect)
//!     .schema_provider(schema)
//!     .executor(executor)
//!     .build()?;
//!
//! let run = orchestrator.run("How many customers are in New York?").await?;
//! if let Some(answer) = run.outcome.answer() {
//!     println!("{}", answer.summary);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Question → Input validation → Query generator ⇄ Query validator
//!   ↓
//! Query executor → Summary generator ⇄ Summary validator → Outcome
//! ```
//!
//! Each validation loop retries at most `max_*_retries` times, feeding the
//! rejection reasons back into the next prompt. When a loop runs out, the last
//! candidate is used and the answer is flagged with a warning.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod generator;
pub mod grounding;
pub mod input;
pub mod machine;
pub mod metrics;
pub mod orchestrator;
pub mod prompts;
pub mod query_validator;
pub mod render;
pub mod state;
pub mod summary_validator;
pub mod verdict_parser;

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::generator::{QueryGenerator, SummaryGenerator};
    pub use crate::input::InputValidator;
    pub use crate::machine::{Event, RetryPolicy, transition};
    pub use crate::metrics::{MetricsSnapshot, WorkflowMetrics};
    pub use crate::orchestrator::{Orchestrator, OrchestratorBuilder, WorkflowRun};
    pub use crate::prompts::PromptBuilder;
    pub use crate::query_validator::QueryValidator;
    pub use crate::state::{
        Answer, FailureCause, Stage, TerminalOutcome, ValidationLoop, ValidationWarning,
        WorkflowState,
    };
    pub use crate::summary_validator::SummaryValidator;
    pub use crate::verdict_parser::parse_verdict;

    // Re-export core types
    pub use docanalyst_core::prelude::*;
}
