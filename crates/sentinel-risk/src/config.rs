//! Risk configuration.
//!
//! Every cap, window and dwell the safety gates use is configurable here.
//! Defaults match the production settings the system ships with.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Session-risk and emergency-gate configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Balance data older than this is a HALT-grade anomaly.
    #[serde(default = "default_balance_stale_secs")]
    pub balance_stale_secs: i64,

    /// Daily realized-loss cap as a fraction of equity.
    #[serde(default = "default_daily_loss_cap_pct")]
    pub daily_loss_cap_pct: Decimal,

    /// Weekly realized-loss cap as a fraction of equity.
    #[serde(default = "default_weekly_loss_cap_pct")]
    pub weekly_loss_cap_pct: Decimal,

    /// Consecutive losing trades that kill the session.
    #[serde(default = "default_loss_streak_kill")]
    pub loss_streak_kill: usize,

    /// 1-minute drop at or below this fraction enters COOLDOWN.
    #[serde(default = "default_drop_1m_cooldown")]
    pub drop_1m_cooldown: Decimal,

    /// 5-minute drop at or below this fraction enters COOLDOWN.
    #[serde(default = "default_drop_5m_cooldown")]
    pub drop_5m_cooldown: Decimal,

    /// 1-minute drop must stay strictly above this to count as recovering.
    #[serde(default = "default_recovery_drop_1m")]
    pub recovery_drop_1m: Decimal,

    /// 5-minute drop must stay strictly above this to count as recovering.
    #[serde(default = "default_recovery_drop_5m")]
    pub recovery_drop_5m: Decimal,

    /// Recovery conditions must hold continuously this long.
    #[serde(default = "default_recovery_dwell_secs")]
    pub recovery_dwell_secs: i64,

    /// Fixed re-entry cooldown applied after COOLDOWN recovery.
    #[serde(default = "default_reentry_cooldown_secs")]
    pub reentry_cooldown_secs: i64,

    /// REST p95 latency at or above this blocks entries (no state change).
    #[serde(default = "default_latency_block_p95_ms")]
    pub latency_block_p95_ms: i64,

    /// Actual/estimated fee ratio above this counts as a spike.
    #[serde(default = "default_fee_spike_ratio")]
    pub fee_spike_ratio: Decimal,

    /// Consecutive spiking fills required to trigger tightening.
    #[serde(default = "default_fee_spike_consecutive")]
    pub fee_spike_consecutive: usize,

    /// How long fee-spike tightening stays active, in hours.
    #[serde(default = "default_fee_tighten_hours")]
    pub fee_tighten_hours: i64,

    /// Multiplier applied to the expected-value gate while tightened.
    #[serde(default = "default_fee_tighten_multiplier")]
    pub fee_tighten_multiplier: Decimal,

    /// Trailing window for slippage history, in seconds.
    #[serde(default = "default_slippage_window_secs")]
    pub slippage_window_secs: i64,

    /// Relative slippage strictly above this is a breach.
    #[serde(default = "default_slippage_breach_pct")]
    pub slippage_breach_pct: Decimal,

    /// Breaches inside the window that escalate to HALT.
    #[serde(default = "default_slippage_halt_count")]
    pub slippage_halt_count: usize,
}

fn default_balance_stale_secs() -> i64 {
    30
}
fn default_daily_loss_cap_pct() -> Decimal {
    Decimal::new(5, 2) // 0.05 = 5%
}
fn default_weekly_loss_cap_pct() -> Decimal {
    Decimal::new(125, 3) // 0.125 = 12.5%
}
fn default_loss_streak_kill() -> usize {
    3
}
fn default_drop_1m_cooldown() -> Decimal {
    Decimal::new(-10, 2) // -0.10
}
fn default_drop_5m_cooldown() -> Decimal {
    Decimal::new(-20, 2) // -0.20
}
fn default_recovery_drop_1m() -> Decimal {
    Decimal::new(-5, 2) // -0.05
}
fn default_recovery_drop_5m() -> Decimal {
    Decimal::new(-10, 2) // -0.10
}
fn default_recovery_dwell_secs() -> i64 {
    300
}
fn default_reentry_cooldown_secs() -> i64 {
    1800
}
fn default_latency_block_p95_ms() -> i64 {
    5000
}
fn default_fee_spike_ratio() -> Decimal {
    Decimal::new(15, 1) // 1.5
}
fn default_fee_spike_consecutive() -> usize {
    2
}
fn default_fee_tighten_hours() -> i64 {
    24
}
fn default_fee_tighten_multiplier() -> Decimal {
    Decimal::new(15, 1) // 1.5
}
fn default_slippage_window_secs() -> i64 {
    600
}
fn default_slippage_breach_pct() -> Decimal {
    Decimal::new(5, 3) // 0.005 = 0.5%
}
fn default_slippage_halt_count() -> usize {
    3
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            balance_stale_secs: default_balance_stale_secs(),
            daily_loss_cap_pct: default_daily_loss_cap_pct(),
            weekly_loss_cap_pct: default_weekly_loss_cap_pct(),
            loss_streak_kill: default_loss_streak_kill(),
            drop_1m_cooldown: default_drop_1m_cooldown(),
            drop_5m_cooldown: default_drop_5m_cooldown(),
            recovery_drop_1m: default_recovery_drop_1m(),
            recovery_drop_5m: default_recovery_drop_5m(),
            recovery_dwell_secs: default_recovery_dwell_secs(),
            reentry_cooldown_secs: default_reentry_cooldown_secs(),
            latency_block_p95_ms: default_latency_block_p95_ms(),
            fee_spike_ratio: default_fee_spike_ratio(),
            fee_spike_consecutive: default_fee_spike_consecutive(),
            fee_tighten_hours: default_fee_tighten_hours(),
            fee_tighten_multiplier: default_fee_tighten_multiplier(),
            slippage_window_secs: default_slippage_window_secs(),
            slippage_breach_pct: default_slippage_breach_pct(),
            slippage_halt_count: default_slippage_halt_count(),
        }
    }
}

/// Connectivity health configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityConfig {
    /// Heartbeat older than this marks the stream degraded.
    #[serde(default = "default_heartbeat_stale_ms")]
    pub heartbeat_stale_ms: i64,

    /// Dropped events at or above this mark the stream degraded.
    #[serde(default = "default_max_dropped_events")]
    pub max_dropped_events: u32,

    /// Continuous degraded time that escalates to HALT.
    #[serde(default = "default_degraded_timeout_secs")]
    pub degraded_timeout_secs: i64,

    /// Re-entry cooldown applied after a successful recovery.
    #[serde(default = "default_degraded_reentry_cooldown_secs")]
    pub reentry_cooldown_secs: i64,
}

fn default_heartbeat_stale_ms() -> i64 {
    10_000
}
fn default_max_dropped_events() -> u32 {
    3
}
fn default_degraded_timeout_secs() -> i64 {
    60
}
fn default_degraded_reentry_cooldown_secs() -> i64 {
    300
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            heartbeat_stale_ms: default_heartbeat_stale_ms(),
            max_dropped_events: default_max_dropped_events(),
            degraded_timeout_secs: default_degraded_timeout_secs(),
            reentry_cooldown_secs: default_degraded_reentry_cooldown_secs(),
        }
    }
}

/// Per-stage liquidation-distance limits.
///
/// A stage is the discrete risk tier (sizing/leverage bundle) selected
/// upstream; the gate only needs its distance parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLimits {
    /// Which risk tier this instance runs at; recorded in audit records.
    #[serde(default = "default_stage_tier")]
    pub tier: u8,

    /// Stop distance is scaled by this to get the required liq distance.
    #[serde(default = "default_stage_multiplier")]
    pub multiplier: Decimal,

    /// Floor on the required liquidation distance, as a fraction.
    #[serde(default = "default_stage_min_absolute")]
    pub min_absolute: Decimal,
}

fn default_stage_tier() -> u8 {
    1
}
fn default_stage_multiplier() -> Decimal {
    Decimal::new(40, 1) // 4.0
}
fn default_stage_min_absolute() -> Decimal {
    Decimal::new(15, 2) // 0.15
}

impl Default for StageLimits {
    fn default() -> Self {
        Self {
            tier: default_stage_tier(),
            multiplier: default_stage_multiplier(),
            min_absolute: default_stage_min_absolute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults_match_shipped_caps() {
        let config = RiskConfig::default();
        assert_eq!(config.daily_loss_cap_pct, dec!(0.05));
        assert_eq!(config.weekly_loss_cap_pct, dec!(0.125));
        assert_eq!(config.loss_streak_kill, 3);
        assert_eq!(config.drop_1m_cooldown, dec!(-0.10));
        assert_eq!(config.drop_5m_cooldown, dec!(-0.20));
        assert_eq!(config.latency_block_p95_ms, 5000);
        assert_eq!(config.slippage_window_secs, 600);
    }

    #[test]
    fn test_stage_defaults() {
        let stage = StageLimits::default();
        assert_eq!(stage.tier, 1);
        assert_eq!(stage.multiplier, dec!(4.0));
        assert_eq!(stage.min_absolute, dec!(0.15));
    }
}
