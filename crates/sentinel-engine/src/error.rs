//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Core error: {0}")]
    Core(#[from] sentinel_core::CoreError),

    #[error("Risk error: {0}")]
    Risk(#[from] sentinel_risk::RiskError),

    #[error("State error: {0}")]
    State(#[from] sentinel_state::StateError),

    #[error("Execution error: {0}")]
    Exec(#[from] sentinel_exec::ExecError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
