//! Core data types for the docanalyst workflow.
//!
//! This module holds the values threaded through a question run: the schema
//! snapshot, candidate queries and their structural reading, result sets,
//! prompts and validator verdicts.

pub mod document;
pub mod prompt;
pub mod query;
pub mod schema;
pub mod verdict;

pub use document::{Document, ResultSet};
pub use prompt::{Prompt, PromptPurpose};
pub use query::{CandidateQuery, FieldReference, ParsedQuery, QueryModifiers, QueryOperation};
pub use schema::{CollectionSchema, SchemaField, SchemaSnapshot};
pub use verdict::Verdict;
