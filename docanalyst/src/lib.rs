//! # DocAnalyst
//!
//! Ask questions of a MongoDB database in plain language. DocAnalyst has a
//! language model write a query, checks it against the database schema and the
//! question, runs it, and has the model summarize the results. The summary is
//! then fact-checked against those results. Either check can send its stage back
//! for another attempt, up to a fixed retry budget.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docanalyst::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(
//! #     executor: Arc<dyn QueryExecutor>,
//! #     schema: Arc<dyn SchemaProvider>,
//! # ) -> Result<()> {
//! let config = AnalystConfig::from_env()?;
//! docanalyst::telemetry::init_tracing(&config.log_level)?;
//!
//! let analyst = AnalystBuilder::new(config)
//!     .executor(executor)
//!     .schema_provider(schema)
//!     .build()?;
//!
//! let run = analyst.run("How many customers are in New York?").await?;
//! println!("{}", run.report(10));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **docanalyst-core**: shared types, collaborator traits, configuration, errors
//! - **docanalyst-workflow**: the state machine, generators, validators and orchestrator
//! - **docanalyst-integrations**: siumai oracle, rate limiting, schema caching and
//!   the MongoDB shell dialect

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export all public APIs from sub-crates
pub use docanalyst_core as core;
pub use docanalyst_integrations as integrations;
pub use docanalyst_workflow as workflow;

pub mod builder;
pub mod telemetry;

pub use builder::AnalystBuilder;

/// Cancellation handle accepted by [`workflow::orchestrator::Orchestrator::run_with_cancellation`].
pub use tokio_util::sync::CancellationToken;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits
/// from all DocAnalyst crates.
pub mod prelude {
    pub use docanalyst_workflow::prelude::*;

    pub use docanalyst_integrations::{
        CachedSchemaProvider, MongoShellDialect, RateLimitedOracle, RateLimiter, SiumaiOracle,
        StaticSchemaProvider, infer_schema,
    };

    pub use crate::CancellationToken;
    pub use crate::builder::AnalystBuilder;
}

/// Version information for DocAnalyst.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
