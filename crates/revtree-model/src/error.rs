//! Error types for the model crate.

/// Errors that can occur while constructing or decoding model values.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A hex string could not be parsed.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// A byte sequence had the wrong length for the target type.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes.
        actual: usize,
    },

    /// Serialization or deserialization error.
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Convenience alias for model results.
pub type ModelResult<T> = Result<T, ModelError>;
