use thiserror::Error;

/// Errors that can occur during essence core operations.
#[derive(Debug, Error)]
pub enum EssenceError {
    /// The sentence embedding model failed to load or failed on a call.
    /// Fatal for the current batch; nothing from the batch is cached.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// A vector presented to the index does not match its configured
    /// dimensionality. Rejected before any index state is mutated.
    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was created with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// Vector and label-set batches passed to `add` differ in length.
    #[error("parallel batch length mismatch: {vectors} vectors, {labels} label sets")]
    LengthMismatch {
        /// Number of vectors in the batch.
        vectors: usize,
        /// Number of label sets in the batch.
        labels: usize,
    },

    /// A snapshot or cache file could not be written or read.
    #[error("persistence failure while {context}: {source}")]
    Persistence {
        /// What was being attempted when the failure occurred.
        context: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A snapshot or cache file failed to serialize or deserialize.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EssenceError {
    /// Shorthand for a [`EssenceError::Persistence`] with context.
    pub fn persistence(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Persistence {
            context: context.into(),
            source,
        }
    }
}

/// Result type alias for essence operations.
pub type Result<T> = std::result::Result<T, EssenceError>;
