//! Error types for the tree-building pipeline.

use revtree_store::StoreError;

/// Errors that can occur while clustering or building trees.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// An object-store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A staged node descriptor was not found in DAG storage.
    #[error("node not found in DAG storage: {0}")]
    NodeNotFound(String),

    /// Disk-backed DAG storage failed.
    #[error("DAG storage error: {0}")]
    Kv(String),

    /// Serialization or deserialization of staged state failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The build was cancelled cooperatively after a task failed.
    #[error("tree build cancelled")]
    Cancelled,

    /// The background persistence writer stopped before the build finished.
    #[error("persistence writer terminated early")]
    WriterClosed,
}

impl From<sled::Error> for BuildError {
    fn from(err: sled::Error) -> Self {
        BuildError::Kv(err.to_string())
    }
}

impl From<std::io::Error> for BuildError {
    fn from(err: std::io::Error) -> Self {
        BuildError::Kv(err.to_string())
    }
}

/// Convenience alias for build results.
pub type BuildResult<T> = Result<T, BuildError>;
