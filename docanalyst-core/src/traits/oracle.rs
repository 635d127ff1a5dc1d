//! Language-model oracle trait.
//!
//! Every language-model call the workflow makes, whether generating a
//! candidate or judging one, goes through [`LanguageModel::complete`]. Tests
//! substitute deterministic canned responses behind the same interface.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{Result, types::Prompt};

/// Prompt in, text out.
///
/// Implementations must map transport, authentication and envelope failures
/// to [`AnalystError::Oracle`](crate::AnalystError::Oracle). Any successful
/// response is returned as-is; interpreting it is the caller's job.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use docanalyst_core::traits::LanguageModel;
/// use docanalyst_core::types::Prompt;
/// use docanalyst_core::Result;
///
/// #[derive(Debug)]
/// struct AlwaysValid;
///
/// #[async_trait]
/// impl LanguageModel for AlwaysValid {
///     async fn complete(&self, _prompt: &Prompt) -> Result<String> {
///         Ok("VALID".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// Send a prompt and return the raw completion text.
    ///
    /// # Errors
    ///
    /// Returns an oracle error if the service cannot be reached or its
    /// response cannot be read as text.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;

    /// Get a human-readable name for this oracle.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Model identifier, when known.
    fn model(&self) -> Option<&str> {
        None
    }

    /// Check if the oracle is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        (**self).complete(prompt).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn model(&self) -> Option<&str> {
        (**self).model()
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }
}
