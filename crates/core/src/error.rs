//! Error types for the miranda content stream evaluator.

use thiserror::Error;

/// Primary error type for content stream evaluation.
///
/// `Format` always means the input stream or one of its resources is
/// non-conformant. `Aborted` is not a failure: it is raised when the host
/// cancels an evaluation and deliberately bypasses normal error reporting.
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("format error: {0}")]
    Format(String),

    #[error("evaluation aborted by host")]
    Aborted,

    #[error("type error: expected {expected}, got {got}")]
    TypeError {
        expected: &'static str,
        got: &'static str,
    },

    #[error("object not found: {0}")]
    ObjectNotFound(u32),

    #[error("circular object reference: {0}")]
    CircularReference(u32),

    #[error("missing resource: {0}")]
    MissingResource(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EvalError {
    /// Whether this error must terminate the evaluation even under
    /// lenient (`ignore_errors`) configuration.
    pub const fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// Convenience Result type alias for EvalError.
pub type Result<T> = std::result::Result<T, EvalError>;
