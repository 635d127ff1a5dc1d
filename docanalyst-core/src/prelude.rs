//! Prelude module for convenient imports.
//!
//! ```rust
//! use docanalyst_core::prelude::*;
//!
//! let query = CandidateQuery::new("db.customers.countDocuments({})");
//! assert!(!query.is_blank());
//! ```

// Re-export core error types
pub use crate::error::{AnalystError, Result};

// Re-export all data types
pub use crate::types::{
    CandidateQuery, CollectionSchema, Document, FieldReference, ParsedQuery, Prompt,
    PromptPurpose, QueryModifiers, QueryOperation, ResultSet, SchemaField, SchemaSnapshot,
    Verdict,
};

// Re-export collaborator traits
pub use crate::traits::{LanguageModel, QueryDialect, QueryExecutor, SchemaProvider};

// Re-export configuration types
pub use crate::config::{
    AnalystConfig, LlmConfig, RateLimitConfig, RenderLimits, StoreConfig, WorkflowConfig,
};
