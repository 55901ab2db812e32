//! LUT error types.

use thiserror::Error;

/// Result type for LUT operations.
pub type LutResult<T> = Result<T, LutError>;

/// Errors that can occur while building a LUT.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LutError {
    /// Gamma exponent is not a finite positive number.
    #[error("invalid gamma {0}: must be a finite number greater than zero")]
    InvalidGamma(f64),
}
