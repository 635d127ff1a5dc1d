//! # docanalyst Core
//!
//! Core traits, types, and configuration for the docanalyst question-answering
//! workflow, which turns a natural-language question about a document store into
//! an answer whose query and summary have both been checked against ground truth.
//!
//! This crate provides:
//!
//! - **Data structures**: schema snapshots, candidate and parsed queries,
//!   result sets, prompts and validator verdicts
//! - **Collaborator traits**: `LanguageModel`, `SchemaProvider`, `QueryExecutor`
//!   and `QueryDialect`
//! - **Configuration**: serde-backed configuration with validation
//! - **Error handling**: one error taxonomy shared by every crate
//!
//! ## Quick Start
//!
//! ```rust
//! use docanalyst_core::prelude::*;
//!
//! let schema = SchemaSnapshot::new()
//!     .with_database("shop")
//!     .with_collection("customers", ["name", "city"]);
//!
//! assert!(schema.has_field("customers", "city"));
//! assert_eq!(Verdict::from_reasons(vec![]), Verdict::Valid);
//! ```
//!
//! Configuration and query types are also available at the crate root:
//!
//! ```rust
//! use docanalyst_core::{QueryModifiers, WorkflowConfig};
//!
//! assert_eq!(WorkflowConfig::default().max_query_retries, 3);
//! assert_eq!(QueryModifiers::default().limit, None);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export commonly used types and traits
pub mod prelude;

// Core modules
pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export key types at crate root for convenience
pub use config::{
    AnalystConfig, LlmConfig, RateLimitConfig, RenderLimits, StoreConfig, WorkflowConfig,
};
pub use error::{AnalystError, Result};
pub use types::{
    CandidateQuery, CollectionSchema, Document, FieldReference, ParsedQuery, Prompt,
    PromptPurpose, QueryModifiers, QueryOperation, ResultSet, SchemaField, SchemaSnapshot,
    Verdict,
};

// Re-export traits for convenience
pub use traits::*;

/// Version information for the docanalyst core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the docanalyst core library.
pub const NAME: &str = env!("CARGO_PKG_NAME");
