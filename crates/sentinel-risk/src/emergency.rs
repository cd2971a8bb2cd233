//! Emergency gate chain.
//!
//! A pure evaluator over (snapshot, session metrics). Gates run in fixed
//! priority order and the first match wins, so a balance anomaly always
//! reports as HALT even when a price collapse is present at the same time.
//!
//! # Gate order
//! 1. Balance anomaly (non-positive equity, stale balance) -> HALT
//! 2. Degraded-connectivity timeout -> HALT
//! 3. Session-risk breaches (daily/weekly caps, loss streak, slippage) -> HALT
//! 4. Short-horizon price collapse -> COOLDOWN (auto-recoverable)
//! 5. REST latency -> BLOCK (entries suppressed, no state change)

use crate::config::{ConnectivityConfig, RiskConfig};
use crate::session::SessionRiskMetrics;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sentinel_core::{GateVerdict, Snapshot};
use tracing::warn;

/// Result of a COOLDOWN recovery evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryStatus {
    /// Price-drop ratios are above the recovery thresholds right now.
    pub conditions_hold: bool,
    /// Conditions have held continuously for the required dwell time.
    pub recovered: bool,
}

/// Fixed-priority emergency evaluator.
#[derive(Debug, Clone)]
pub struct EmergencyGateChain {
    config: RiskConfig,
    connectivity: ConnectivityConfig,
}

impl EmergencyGateChain {
    pub fn new(config: RiskConfig, connectivity: ConnectivityConfig) -> Self {
        Self {
            config,
            connectivity,
        }
    }

    /// Evaluate the chain for one tick.
    ///
    /// `degraded_for_secs` is the continuous degraded duration tracked by
    /// the orchestrator, `None` while the stream is healthy.
    pub fn evaluate(
        &self,
        snapshot: &Snapshot,
        metrics: &SessionRiskMetrics,
        degraded_for_secs: Option<i64>,
    ) -> GateVerdict {
        // Gate 1: balance anomaly. Manual reset only.
        if snapshot.account.equity <= Decimal::ZERO {
            warn!(equity = %snapshot.account.equity, "balance anomaly: non-positive equity");
            return GateVerdict::halt(format!(
                "balance anomaly: equity {} <= 0",
                snapshot.account.equity
            ));
        }
        let balance_age = snapshot.balance_age_secs();
        if balance_age > self.config.balance_stale_secs {
            return GateVerdict::halt(format!(
                "balance anomaly: balance {}s stale > {}s max",
                balance_age, self.config.balance_stale_secs
            ));
        }

        // Gate 2: degraded-connectivity timeout.
        if let Some(secs) = degraded_for_secs {
            if secs >= self.connectivity.degraded_timeout_secs {
                return GateVerdict::halt(format!(
                    "connectivity degraded for {}s >= {}s",
                    secs, self.connectivity.degraded_timeout_secs
                ));
            }
        }

        // Gate 3: session-risk breaches.
        let daily_cap = -(snapshot.account.equity * self.config.daily_loss_cap_pct);
        if metrics.daily_pnl < daily_cap {
            return GateVerdict::halt(format!(
                "daily loss cap breached: pnl {} < cap {}",
                metrics.daily_pnl, daily_cap
            ));
        }
        let weekly_cap = -(snapshot.account.equity * self.config.weekly_loss_cap_pct);
        if metrics.weekly_pnl < weekly_cap {
            return GateVerdict::halt(format!(
                "weekly loss cap breached: pnl {} < cap {}",
                metrics.weekly_pnl, weekly_cap
            ));
        }
        if metrics.loss_streak >= self.config.loss_streak_kill {
            return GateVerdict::halt(format!(
                "loss streak {} >= {} kill threshold",
                metrics.loss_streak, self.config.loss_streak_kill
            ));
        }
        if metrics.slippage_breaches >= self.config.slippage_halt_count {
            return GateVerdict::halt(format!(
                "slippage anomaly: {} breaches in window >= {}",
                metrics.slippage_breaches, self.config.slippage_halt_count
            ));
        }

        // Gate 4: short-horizon price collapse. Auto-recoverable.
        if snapshot.market.drop_1m <= self.config.drop_1m_cooldown {
            return GateVerdict::cooldown(format!(
                "price collapse: 1m drop {} <= {}",
                snapshot.market.drop_1m, self.config.drop_1m_cooldown
            ));
        }
        if snapshot.market.drop_5m <= self.config.drop_5m_cooldown {
            return GateVerdict::cooldown(format!(
                "price collapse: 5m drop {} <= {}",
                snapshot.market.drop_5m, self.config.drop_5m_cooldown
            ));
        }

        // Gate 5: REST latency. Entry suppression only.
        if snapshot.health.rest_latency_p95_ms >= self.config.latency_block_p95_ms {
            return GateVerdict::block(format!(
                "rest latency p95 {}ms >= {}ms",
                snapshot.health.rest_latency_p95_ms, self.config.latency_block_p95_ms
            ));
        }

        GateVerdict::pass()
    }

    /// Evaluate COOLDOWN recovery for one tick.
    ///
    /// The orchestrator owns continuity: `held_since` is the instant the
    /// recovery conditions started holding (reset to `None` whenever they
    /// lapse). This function stays pure by taking it as input.
    pub fn evaluate_recovery(
        &self,
        snapshot: &Snapshot,
        held_since: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> RecoveryStatus {
        let conditions_hold = snapshot.market.drop_1m > self.config.recovery_drop_1m
            && snapshot.market.drop_5m > self.config.recovery_drop_5m;

        let recovered = conditions_hold
            && held_since.is_some_and(|since| {
                now - since >= Duration::seconds(self.config.recovery_dwell_secs)
            });

        RecoveryStatus {
            conditions_hold,
            recovered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use sentinel_core::{AccountView, HealthView, MarketView, Price};

    fn metrics() -> SessionRiskMetrics {
        SessionRiskMetrics {
            daily_pnl: Decimal::ZERO,
            weekly_pnl: Decimal::ZERO,
            loss_streak: 0,
            fee_spike: false,
            slippage_breaches: 0,
        }
    }

    fn snapshot() -> Snapshot {
        Snapshot::new(
            MarketView {
                price: Price::new(dec!(50000)),
                drop_1m: dec!(-0.01),
                drop_5m: dec!(-0.02),
                volatility_pct: dec!(40),
            },
            AccountView {
                equity: dec!(1000),
                available_margin: dec!(800),
                balance_updated_at: Utc::now(),
            },
            HealthView {
                rest_latency_p95_ms: 300,
                heartbeat_age_ms: 1500,
                dropped_events: 0,
            },
        )
    }

    fn chain() -> EmergencyGateChain {
        EmergencyGateChain::new(RiskConfig::default(), ConnectivityConfig::default())
    }

    #[test]
    fn test_pass_on_clean_inputs() {
        assert!(chain().evaluate(&snapshot(), &metrics(), None).is_pass());
    }

    #[test]
    fn test_balance_anomaly_halts() {
        let mut snap = snapshot();
        snap.account.equity = dec!(0);
        let status = chain().evaluate(&snap, &metrics(), None);
        assert!(status.is_halt());
        assert!(status.reason.contains("balance"));
    }

    #[test]
    fn test_stale_balance_halts() {
        let mut snap = snapshot();
        snap.account.balance_updated_at = snap.timestamp - Duration::seconds(31);
        let status = chain().evaluate(&snap, &metrics(), None);
        assert!(status.is_halt());
        assert!(status.reason.contains("stale"));
    }

    #[test]
    fn test_balance_beats_price_collapse() {
        // Both conditions present: balance anomaly must win (HALT, not COOLDOWN).
        let mut snap = snapshot();
        snap.account.equity = dec!(-5);
        snap.market.drop_1m = dec!(-0.15);

        let status = chain().evaluate(&snap, &metrics(), None);
        assert!(status.is_halt());
        assert!(!status.is_cooldown());
        assert!(status.reason.contains("balance"));
    }

    #[test]
    fn test_degraded_timeout_halts() {
        let status = chain().evaluate(&snapshot(), &metrics(), Some(60));
        assert!(status.is_halt());
        assert!(status.reason.contains("degraded"));

        let status = chain().evaluate(&snapshot(), &metrics(), Some(59));
        assert!(status.is_pass());
    }

    #[test]
    fn test_daily_cap_example() {
        // Equity $125, daily pnl -$7: cap is -$6.25, breached.
        let mut snap = snapshot();
        snap.account.equity = dec!(125);
        let mut m = metrics();
        m.daily_pnl = dec!(-7);

        let status = chain().evaluate(&snap, &m, None);
        assert!(status.is_halt());
        assert!(status.reason.contains("daily"));
    }

    #[test]
    fn test_daily_cap_exactly_at_cap_passes() {
        let mut snap = snapshot();
        snap.account.equity = dec!(125);
        let mut m = metrics();
        m.daily_pnl = dec!(-6.25);

        assert!(chain().evaluate(&snap, &m, None).is_pass());
    }

    #[test]
    fn test_weekly_cap_halts() {
        let mut m = metrics();
        m.weekly_pnl = dec!(-126); // cap at equity 1000 is -125
        let status = chain().evaluate(&snapshot(), &m, None);
        assert!(status.is_halt());
        assert!(status.reason.contains("weekly"));
    }

    #[test]
    fn test_loss_streak_halts() {
        let mut m = metrics();
        m.loss_streak = 3;
        let status = chain().evaluate(&snapshot(), &m, None);
        assert!(status.is_halt());
        assert!(status.reason.contains("streak"));
    }

    #[test]
    fn test_slippage_breaches_halt() {
        let mut m = metrics();
        m.slippage_breaches = 3;
        let status = chain().evaluate(&snapshot(), &m, None);
        assert!(status.is_halt());
        assert!(status.reason.contains("slippage"));
    }

    #[test]
    fn test_price_collapse_cooldown() {
        let mut snap = snapshot();
        snap.market.drop_1m = dec!(-0.10);
        let status = chain().evaluate(&snap, &metrics(), None);
        assert!(status.is_cooldown());
        assert!(!status.is_halt());

        let mut snap = snapshot();
        snap.market.drop_5m = dec!(-0.25);
        assert!(chain().evaluate(&snap, &metrics(), None).is_cooldown());
    }

    #[test]
    fn test_latency_blocks_only() {
        let mut snap = snapshot();
        snap.health.rest_latency_p95_ms = 5000;
        let status = chain().evaluate(&snap, &metrics(), None);
        assert!(status.is_block());
        assert!(!status.is_halt());
        assert!(!status.is_cooldown());
    }

    #[test]
    fn test_recovery_requires_dwell() {
        let snap = snapshot(); // drops well above recovery thresholds
        let now = Utc::now();
        let c = chain();

        // No continuity yet.
        let status = c.evaluate_recovery(&snap, None, now);
        assert!(status.conditions_hold);
        assert!(!status.recovered);

        // Held 4 minutes: not enough.
        let status = c.evaluate_recovery(&snap, Some(now - Duration::seconds(240)), now);
        assert!(!status.recovered);

        // Held 5 minutes: recovered.
        let status = c.evaluate_recovery(&snap, Some(now - Duration::seconds(300)), now);
        assert!(status.recovered);
    }

    #[test]
    fn test_recovery_conditions_lapse() {
        let mut snap = snapshot();
        snap.market.drop_1m = dec!(-0.06); // below the -5% recovery threshold
        let now = Utc::now();

        let status = chain().evaluate_recovery(&snap, Some(now - Duration::seconds(600)), now);
        assert!(!status.conditions_hold);
        assert!(!status.recovered);
    }
}
