//! Error types for the object-store boundary.

use revtree_model::ObjectId;

/// Errors that can occur during object-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A requested tree does not exist in the store.
    #[error("tree not found: {0:?}")]
    TreeNotFound(ObjectId),

    /// Refused to store an object under the null id.
    #[error("refusing to store an object with a null id")]
    NullObjectId,

    /// Backend I/O error.
    #[error("storage I/O error: {0}")]
    Io(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;
