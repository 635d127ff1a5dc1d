//! Schema snapshot provider trait.

use async_trait::async_trait;
use std::sync::Arc;

use crate::{Result, types::SchemaSnapshot};

/// Supplies the collections and fields known to the document store.
///
/// The workflow asks for a snapshot once per run. Providers are free to cache,
/// but a run never sees the snapshot change underneath it.
#[async_trait]
pub trait SchemaProvider: Send + Sync + std::fmt::Debug {
    /// Fetch the current schema snapshot.
    ///
    /// # Errors
    ///
    /// Returns a connectivity error if the store is unreachable.
    async fn schema(&self) -> Result<SchemaSnapshot>;

    /// Get a human-readable name for this provider.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Drop any cached snapshot so the next call fetches fresh data.
    async fn invalidate(&self) {}
}

#[async_trait]
impl<T: SchemaProvider + ?Sized> SchemaProvider for Arc<T> {
    async fn schema(&self) -> Result<SchemaSnapshot> {
        (**self).schema().await
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn invalidate(&self) {
        (**self).invalidate().await;
    }
}
