//! Core domain types for the sentinel trading agent.
//!
//! This crate provides the types shared by every layer of the control loop:
//! - `Price`, `Size`: precision-safe numeric types
//! - `Snapshot`: the immutable per-tick input (market, account, health)
//! - `Position`, `PendingOrder`: the state machine's owned records
//! - `SignalId`, `OrderRef`: deterministic idempotency identifiers
//! - `Verdict`, `GateVerdict`: the uniform safety-evaluator output
//! - `TransitionRecord`: validated audit records for state changes

pub mod audit;
pub mod decimal;
pub mod error;
pub mod order;
pub mod position;
pub mod snapshot;
pub mod trade;
pub mod verdict;

pub use audit::{TransitionContext, TransitionRecord};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use order::{Direction, OrderRef, OrderRole, OrderSide, SignalId, StopStatus};
pub use position::{PendingOrder, Position};
pub use snapshot::{AccountView, HealthView, MarketView, Snapshot};
pub use trade::{FillEvent, Trade};
pub use verdict::{GateVerdict, Verdict};
