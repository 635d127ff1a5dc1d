//! Query executor trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    Result,
    types::{CandidateQuery, ResultSet},
};

/// Runs a query against the document store.
///
/// An empty [`ResultSet`] means nothing matched. A query the store rejects or
/// cannot run is an [`AnalystError::Execution`](crate::AnalystError::Execution);
/// an unreachable store is an
/// [`AnalystError::Connectivity`](crate::AnalystError::Connectivity).
#[async_trait]
pub trait QueryExecutor: Send + Sync + std::fmt::Debug {
    /// Execute the query and return the documents in store order.
    async fn execute(&self, query: &CandidateQuery) -> Result<ResultSet>;

    /// Get a human-readable name for this executor.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Check if the store is reachable.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn execute(&self, query: &CandidateQuery) -> Result<ResultSet> {
        (**self).execute(query).await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }
}
