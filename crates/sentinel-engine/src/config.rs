//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use rust_decimal::Decimal;
use sentinel_exec::ExecConfig;
use sentinel_risk::{ConnectivityConfig, RiskConfig, StageLimits};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration for one agent instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Strategy tag mixed into every idempotency key.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Decision cycle interval.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Presence of this file stops all trading.
    #[serde(default = "default_kill_switch_path")]
    pub kill_switch_path: String,

    /// Protective stop distance as a fraction of entry price, used when a
    /// position is recovered without a known stop.
    #[serde(default = "default_stop_distance_pct")]
    pub stop_distance_pct: Decimal,

    /// Minimum expected edge (fraction of notional) for an entry.
    #[serde(default = "default_min_edge_pct")]
    pub min_edge_pct: Decimal,

    #[serde(default)]
    pub exec: ExecConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub connectivity: ConnectivityConfig,

    #[serde(default)]
    pub stage: StageLimits,
}

fn default_strategy() -> String {
    "grid_v2".to_string()
}
fn default_tick_interval_secs() -> u64 {
    5
}
fn default_kill_switch_path() -> String {
    "KILL_SWITCH".to_string()
}
fn default_stop_distance_pct() -> Decimal {
    Decimal::new(3, 2) // 0.03
}
fn default_min_edge_pct() -> Decimal {
    Decimal::new(1, 3) // 0.001
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            tick_interval_secs: default_tick_interval_secs(),
            kill_switch_path: default_kill_switch_path(),
            stop_distance_pct: default_stop_distance_pct(),
            min_edge_pct: default_min_edge_pct(),
            exec: ExecConfig::default(),
            risk: RiskConfig::default(),
            connectivity: ConnectivityConfig::default(),
            stage: StageLimits::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file.
    pub fn load() -> EngineResult<Self> {
        let config_path =
            std::env::var("SENTINEL_CONFIG").unwrap_or_else(|_| "config/default.toml".to_string());

        if Path::new(&config_path).exists() {
            Self::from_file(&config_path)
        } else {
            tracing::warn!(path = %config_path, "Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_interval_secs, 5);
        assert_eq!(config.stop_distance_pct, dec!(0.03));
        assert_eq!(config.exec.max_ref_len, 36);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            strategy = "breakout_v1"
            tick_interval_secs = 10

            [exec]
            symbol = "ETH-PERP"

            [risk]
            daily_loss_cap_pct = 0.03

            [stage]
            tier = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.strategy, "breakout_v1");
        assert_eq!(config.tick_interval_secs, 10);
        assert_eq!(config.exec.symbol, "ETH-PERP");
        assert_eq!(config.exec.max_ref_len, 36);
        assert_eq!(config.risk.daily_loss_cap_pct, dec!(0.03));
        assert_eq!(config.risk.weekly_loss_cap_pct, dec!(0.125));
        assert_eq!(config.connectivity.heartbeat_stale_ms, 10_000);
        assert_eq!(config.stage.tier, 2);
        assert_eq!(config.stage.multiplier, dec!(4.0));
    }
}
