//! Safety gates for the sentinel trading agent.
//!
//! Implements the evaluators the tick orchestrator runs every cycle:
//! - `EmergencyGateChain`: fixed-priority halt/cooldown/block chain
//! - `SessionRiskTracker`: stateless PnL/streak/fee/slippage calculators
//! - `ConnectivityMonitor`: stream heartbeat and event-loss health
//! - `LiquidationGate` / `FeeTightening`: pre-trade entry gates
//!
//! Every evaluator is a pure function over the tick snapshot and passed-in
//! history; continuity timestamps (degraded-since, cooldown-since) are
//! owned by the orchestrator and handed in by value.

pub mod config;
pub mod connectivity;
pub mod emergency;
pub mod error;
pub mod pretrade;
pub mod session;

pub use config::{ConnectivityConfig, RiskConfig, StageLimits};
pub use connectivity::{ConnectivityMonitor, HealthVerdict};
pub use emergency::{EmergencyGateChain, RecoveryStatus};
pub use error::{RiskError, RiskResult};
pub use pretrade::{EntryRisk, FeeTightening, LiquidationGate, PreTradeDecision};
pub use session::{SessionRiskMetrics, SessionRiskTracker};
