//! Error types for the compute core

use thiserror::Error;

/// Result type alias for compute operations
pub type Result<T> = std::result::Result<T, ComputeError>;

/// Main error type for kernel dispatch and execution
#[derive(Error, Debug)]
pub enum ComputeError {
    /// No kernel or cast exists for the requested types. Not recoverable
    /// by retry; the caller must change the request.
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Malformed call: missing required option, wrong arity, shape
    /// mismatch between Datum kinds, or an impossible implicit coercion.
    #[error("Invalid: {0}")]
    Invalid(String),

    /// Type-level incompatibility discovered during promotion.
    #[error("Type error: {0}")]
    Type(String),

    /// Data-dependent failure discovered while executing over actual
    /// values: overflow when disallowed, invalid UTF-8, parse failures.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Executor failure: pool shut down, task cancelled.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl ComputeError {
    /// Shorthand used by promotion when two operand types have no common
    /// comparable type.
    pub fn incompatible_types(
        lhs: &arrow::datatypes::DataType,
        rhs: &arrow::datatypes::DataType,
    ) -> Self {
        ComputeError::Type(format!(
            "Types {lhs} and {rhs} have no common comparable type"
        ))
    }
}
