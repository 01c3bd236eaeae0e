//! Error types for yolopost.

use thiserror::Error;

/// Result alias for yolopost operations.
pub type YoloPostResult<T> = std::result::Result<T, YoloPostError>;

/// Errors that can occur when compiling a model spec or running detection.
///
/// Empty results are never errors: zero candidates above threshold and zero
/// boxes after suppression both return empty lists.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum YoloPostError {
    /// A raw output buffer does not hold the element count its scale requires.
    /// Indicates an engine/configuration mismatch; not retryable.
    #[error("scale {scale}: expected {expected} elements, got {got}")]
    ShapeMismatch {
        scale: usize,
        expected: usize,
        got: usize,
    },
    /// The number of raw outputs differs from the number of compiled scales.
    #[error("expected {expected} raw outputs, got {got}")]
    ScaleCountMismatch { expected: usize, got: usize },
    /// No raw outputs were supplied.
    #[error("no raw outputs provided")]
    EmptyInput,
    /// A configuration value is out of range.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: &'static str },
}
