//! Error types for extraction and payload decoding.

use thiserror::Error;

/// Result type for extraction.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Errors returned by the [`Extractor`](crate::extract::Extractor).
///
/// Extraction never panics past its boundary; every internal failure is
/// either degraded to a partial tree or reported as one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    /// No native node could be located for the requested role.
    #[error("Element not found: {0}")]
    NotFound(String),

    /// The native node exists but does not describe a builder element.
    #[error("Invalid element structure: {0}")]
    InvalidStructure(String),
}

/// Errors for payloads that carry our marker but cannot be used.
///
/// Text without the marker is never an error, it decodes to `None`.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The `data` member is missing or is not an element object.
    #[error("Payload has no usable element data: {0}")]
    InvalidData(String),

    /// Serialization failed while encoding.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
