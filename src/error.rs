//! Error types for the cache core.
//!
//! A missing record and a record from an older schema are never errors:
//! both are resolved by the record defaulter. What remains is store
//! failure, BSON mapping failure, and rejected mutations.

use mongodb::bson;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the cache core.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The document store could not be reached or rejected the call.
    #[error("document store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A bulk upsert reached the server but some operations failed.
    #[error("bulk upsert on '{collection}' had {failed} failed operation(s)")]
    BulkWrite { collection: &'static str, failed: usize },

    #[error("failed to encode record: {0}")]
    Encode(#[from] bson::ser::Error),

    #[error("failed to decode record: {0}")]
    Decode(#[from] bson::de::Error),

    /// A stored document has no usable identifier and cannot be cached.
    #[error("document in '{collection}' is missing key field '{field}'")]
    MissingKey {
        collection: &'static str,
        field: &'static str,
    },

    /// A mutation was rejected before anything was applied.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<mongodb::error::Error> for CacheError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::StoreUnavailable(Box::new(err))
    }
}

impl CacheError {
    /// Whether this error came from the store rather than from local data.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_) | Self::BulkWrite { .. })
    }
}
