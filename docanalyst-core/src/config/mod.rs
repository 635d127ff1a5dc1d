//! Configuration types for the docanalyst workflow.
//!
//! Configurations are serde-serializable, built with `with_*` methods and
//! checked with `validate()`, which reports problems as
//! [`AnalystError::Configuration`](crate::AnalystError::Configuration).

pub mod analyst;
pub mod llm;
pub mod rate_limit;
pub mod store;
pub mod workflow;

pub use analyst::AnalystConfig;
pub use llm::LlmConfig;
pub use rate_limit::RateLimitConfig;
pub use store::StoreConfig;
pub use workflow::{DEFAULT_BLOCKED_PATTERNS, DEFAULT_MAX_RETRIES, RenderLimits, WorkflowConfig};
