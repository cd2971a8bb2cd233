//! Execution error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Invalid order reference: {0}")]
    InvalidReference(#[from] sentinel_core::CoreError),

    #[error("Venue rejected request: {code} {message}")]
    Venue { code: i64, message: String },

    /// The venue cannot modify this order in place; the caller must fall
    /// back to cancel-and-replace or leave the order as is.
    #[error("Amend not supported for order {0}")]
    AmendUnsupported(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ExecError {
    /// Ambiguous failures: the request may have reached the venue, so the
    /// order's fate must be resolved by reconciliation, not by resubmitting.
    #[must_use]
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

pub type ExecResult<T> = Result<T, ExecError>;
