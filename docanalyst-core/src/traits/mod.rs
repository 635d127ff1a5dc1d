//! Collaborator traits for the docanalyst workflow.
//!
//! The workflow only sequences calls to already-available services. Each
//! service sits behind one of these narrow, object-safe traits so that tests
//! can drive every transition with deterministic substitutes.

pub mod dialect;
pub mod executor;
pub mod oracle;
pub mod schema;

pub use dialect::QueryDialect;
pub use executor::QueryExecutor;
pub use oracle::LanguageModel;
pub use schema::SchemaProvider;
