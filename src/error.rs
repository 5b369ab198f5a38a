//! Request-time error types
//!
//! Errors an engine operation can report to its caller. Load-time model
//! problems live in [`crate::model::ModelError`]. Arithmetic degeneracy
//! (division by zero, empty groups, all-NULL columns) is never an error:
//! those paths produce NULL cells instead.

use thiserror::Error;

/// Errors that can occur while executing an engine operation
#[derive(Error, Debug)]
pub enum EngineError {
    /// Requested name is not declared on the dataset
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Field's owning table is not reachable through the dataset's joins
    #[error("Field '{field}' requires a join not registered for dataset '{dataset}'")]
    AmbiguousJoin {
        /// The requested field
        field: String,
        /// The dataset the request ran against
        dataset: String,
    },

    /// Ragged or type-mismatched input rows
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Bad operation parameter (non-positive window size, unsupported grain, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
