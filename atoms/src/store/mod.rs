//! Key-value seam the services persist through.
//!
//! Keys are `<namespace>:<id>` strings (`report:...`, `user:...`); values are
//! JSON documents. There are no secondary indices: every listing is a prefix
//! scan.

pub mod dynamo;
pub mod fallback;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

pub use dynamo::DynamoKvStore;
pub use fallback::FallbackKvStore;
pub use memory::MemoryKvStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached. The only error that triggers the local fallback.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    async fn del(&self, key: &str) -> Result<(), StoreError>;

    /// All `(key, value)` pairs whose key starts with `prefix`, ordered by key
    async fn get_by_prefix(&self, prefix: &str) -> Result<Vec<(String, Value)>, StoreError>;

    /// Push writes that were parked locally back to the authoritative store.
    /// Returns how many were replayed.
    async fn reconcile(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

pub type SharedStore = Arc<dyn KvStore>;

/// Text before the first `:` of a key; the whole key when there is none
pub fn namespace_of(key: &str) -> &str {
    key.split_once(':').map(|(ns, _)| ns).unwrap_or(key)
}
