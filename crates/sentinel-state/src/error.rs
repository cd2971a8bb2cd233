//! State machine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid transition: {action} not allowed in {from}")]
    InvalidTransition { from: String, action: String },

    #[error("State invariant violated: {0}")]
    InvariantViolation(String),
}

pub type StateResult<T> = Result<T, StateError>;
