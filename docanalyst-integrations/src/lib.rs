//! Collaborator implementations for DocAnalyst.
//!
//! This crate connects the workflow's collaborator traits to real services:
//!
//! - **Oracle**: [`SiumaiOracle`] speaks to `OpenAI`, Anthropic or Ollama through siumai
//! - **Rate limiting**: [`RateLimitedOracle`] keeps oracle traffic inside a sliding window
//! - **Schema**: [`CachedSchemaProvider`] and [`StaticSchemaProvider`]
//! - **MongoDB shell dialect**: [`MongoShellDialect`] extracts, parses and
//!   reads field references out of `db.<collection>.<method>(...)` queries

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod mongo;
pub mod oracle;
pub mod rate_limit;
pub mod schema;

// Re-export commonly used types
pub use mongo::MongoShellDialect;
pub use oracle::{OracleFactory, SiumaiOracle};
pub use rate_limit::{RateLimitedOracle, RateLimiter};
pub use schema::{CachedSchemaProvider, StaticSchemaProvider, infer_schema};
