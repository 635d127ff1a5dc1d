//! Schema snapshot providers.
//!
//! - [`CachedSchemaProvider`] keeps the last snapshot of any provider for a TTL
//! - [`StaticSchemaProvider`] serves a fixed snapshot, optionally inferred from
//!   sample documents with [`infer_schema`]

mod cache;
mod inference;

pub use cache::{CacheStats, CachedSchemaProvider};
pub use inference::{StaticSchemaProvider, infer_collection, infer_schema};
