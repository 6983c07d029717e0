//! Error types for bucket operations

use thiserror::Error;

/// Failures raised by this crate itself, as opposed to errors reported by the
/// remote API (see [`crate::gcp::http::ApiError`]).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BucketError {
    /// The configuration cannot be turned into a valid bucket specification
    #[error("validation error: {0}")]
    Validation(String),

    /// Deleting a non-empty bucket without `force_destroy`
    #[error(
        "Error trying to delete bucket {bucket} containing {objects} objects without `force_destroy` set to true"
    )]
    BucketNotEmpty { bucket: String, objects: usize },
}

impl BucketError {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Whether this error came from configuration validation
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
