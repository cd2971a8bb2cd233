//! Session risk tracking.
//!
//! Stateless calculators over trade/fill history. Nothing here persists
//! counters between calls: every metric is recomputed fresh from the
//! history slices the orchestrator passes in, which makes the numbers
//! trivially replayable from the audit trail.
//!
//! History slices are ordered oldest first (newest last), matching the
//! order the venue's execution-history endpoint returns.

use crate::config::RiskConfig;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sentinel_core::{FillEvent, Trade};

/// Rolling session metrics consumed by the emergency gate chain.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRiskMetrics {
    /// Realized PnL since the most recent UTC midnight.
    pub daily_pnl: Decimal,
    /// Realized PnL since the most recent Monday 00:00 UTC.
    pub weekly_pnl: Decimal,
    /// Consecutive losing trades, counted from the newest backward.
    pub loss_streak: usize,
    /// Fee spike detected on the most recent consecutive fills.
    pub fee_spike: bool,
    /// Slippage breaches inside the trailing window.
    pub slippage_breaches: usize,
}

/// Stateless session-risk calculator.
#[derive(Debug, Clone)]
pub struct SessionRiskTracker {
    config: RiskConfig,
}

impl SessionRiskTracker {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    /// Compute all metrics for one tick.
    pub fn metrics(
        &self,
        trades: &[Trade],
        fills: &[FillEvent],
        now: DateTime<Utc>,
    ) -> SessionRiskMetrics {
        SessionRiskMetrics {
            daily_pnl: self.daily_realized_pnl(trades, now),
            weekly_pnl: self.weekly_realized_pnl(trades, now),
            loss_streak: self.loss_streak(trades),
            fee_spike: self.fee_spike(fills),
            slippage_breaches: self.slippage_breaches(fills, now),
        }
    }

    /// Sum of closed-trade PnL since the most recent UTC midnight.
    ///
    /// A trade stamped exactly at midnight belongs to the new day.
    pub fn daily_realized_pnl(&self, trades: &[Trade], now: DateTime<Utc>) -> Decimal {
        let day_start = utc_day_start(now);
        trades
            .iter()
            .filter(|t| t.closed_at >= day_start)
            .map(|t| t.pnl)
            .sum()
    }

    /// Sum of closed-trade PnL since the most recent Monday 00:00 UTC.
    pub fn weekly_realized_pnl(&self, trades: &[Trade], now: DateTime<Utc>) -> Decimal {
        let week_start = utc_week_start(now);
        trades
            .iter()
            .filter(|t| t.closed_at >= week_start)
            .map(|t| t.pnl)
            .sum()
    }

    /// Consecutive losing trades, scanning newest-first and stopping at the
    /// first non-loss.
    pub fn loss_streak(&self, trades: &[Trade]) -> usize {
        trades.iter().rev().take_while(|t| t.is_loss()).count()
    }

    /// Per-fill `fee / notional` ratios; zero-notional fills are excluded
    /// (undefined ratio).
    pub fn fee_ratio_history(&self, fills: &[FillEvent]) -> Vec<Decimal> {
        fills.iter().filter_map(|f| f.fee_ratio()).collect()
    }

    /// Signed slippage per fill inside the trailing window; older events
    /// are dropped.
    pub fn slippage_history(&self, fills: &[FillEvent], now: DateTime<Utc>) -> Vec<Decimal> {
        let cutoff = now - Duration::seconds(self.config.slippage_window_secs);
        fills
            .iter()
            .filter(|f| f.timestamp >= cutoff)
            .map(|f| f.slippage())
            .collect()
    }

    /// Fee spike: actual/estimated fee above the spike ratio on the
    /// required number of consecutive most-recent fills.
    pub fn fee_spike(&self, fills: &[FillEvent]) -> bool {
        let needed = self.config.fee_spike_consecutive;
        if needed == 0 || fills.len() < needed {
            return false;
        }
        fills.iter().rev().take(needed).all(|f| {
            f.fee_vs_estimate()
                .is_some_and(|r| r > self.config.fee_spike_ratio)
        })
    }

    /// Slippage breaches inside the trailing window.
    pub fn slippage_breaches(&self, fills: &[FillEvent], now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(self.config.slippage_window_secs);
        fills
            .iter()
            .filter(|f| f.timestamp >= cutoff)
            .filter(|f| {
                f.slippage_pct()
                    .is_some_and(|pct| pct > self.config.slippage_breach_pct)
            })
            .count()
    }
}

/// Most recent UTC midnight at or before `now`.
pub fn utc_day_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
        .unwrap()
}

/// Most recent Monday 00:00 UTC at or before `now`.
pub fn utc_week_start(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_back = now.weekday().num_days_from_monday() as i64;
    utc_day_start(now) - Duration::days(days_back)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sentinel_core::{Price, Size};

    fn tracker() -> SessionRiskTracker {
        SessionRiskTracker::new(RiskConfig::default())
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn trade(pnl: Decimal, at: DateTime<Utc>) -> Trade {
        Trade::new(pnl, at)
    }

    fn fill_at(
        expected: Decimal,
        filled: Decimal,
        fee: Decimal,
        est_fee: Decimal,
        at: DateTime<Utc>,
    ) -> FillEvent {
        FillEvent {
            qty: Size::new(dec!(1)),
            expected_price: Price::new(expected),
            filled_price: Price::new(filled),
            fee,
            estimated_fee: est_fee,
            timestamp: at,
        }
    }

    #[test]
    fn test_daily_pnl_window() {
        let now = utc(2026, 3, 4, 10, 0, 0); // Wednesday
        let trades = vec![
            trade(dec!(-50), utc(2026, 3, 3, 23, 59, 59)), // yesterday
            trade(dec!(3), utc(2026, 3, 4, 1, 0, 0)),
            trade(dec!(-5), utc(2026, 3, 4, 9, 0, 0)),
        ];
        assert_eq!(tracker().daily_realized_pnl(&trades, now), dec!(-2));
    }

    #[test]
    fn test_midnight_boundary_counts_in_new_day() {
        let now = utc(2026, 3, 4, 10, 0, 0);
        let trades = vec![trade(dec!(-7), utc(2026, 3, 4, 0, 0, 0))];
        assert_eq!(tracker().daily_realized_pnl(&trades, now), dec!(-7));
    }

    #[test]
    fn test_weekly_pnl_since_monday() {
        let now = utc(2026, 3, 4, 10, 0, 0); // Wednesday; Monday is 2026-03-02
        let trades = vec![
            trade(dec!(-100), utc(2026, 3, 1, 12, 0, 0)), // prior Sunday
            trade(dec!(-10), utc(2026, 3, 2, 0, 0, 0)),   // Monday 00:00 counts
            trade(dec!(4), utc(2026, 3, 3, 12, 0, 0)),
        ];
        assert_eq!(tracker().weekly_realized_pnl(&trades, now), dec!(-6));
    }

    #[test]
    fn test_loss_streak_stops_at_first_non_loss() {
        let now = Utc::now();
        // Newest last: +5, -2, -3, -1 => streak of 3.
        let trades = vec![
            trade(dec!(5), now),
            trade(dec!(-2), now),
            trade(dec!(-3), now),
            trade(dec!(-1), now),
        ];
        assert_eq!(tracker().loss_streak(&trades), 3);
    }

    #[test]
    fn test_loss_streak_zero_when_latest_wins() {
        let now = Utc::now();
        let trades = vec![trade(dec!(-2), now), trade(dec!(1), now)];
        assert_eq!(tracker().loss_streak(&trades), 0);
    }

    #[test]
    fn test_fee_ratio_excludes_zero_notional() {
        let now = Utc::now();
        let mut zero = fill_at(dec!(100), dec!(100), dec!(0.1), dec!(0.1), now);
        zero.qty = Size::ZERO;
        let fills = vec![fill_at(dec!(100), dec!(100), dec!(0.1), dec!(0.1), now), zero];

        assert_eq!(tracker().fee_ratio_history(&fills).len(), 1);
    }

    #[test]
    fn test_slippage_window_drops_old_events() {
        let now = Utc::now();
        let fills = vec![
            fill_at(dec!(100), dec!(102), dec!(0.1), dec!(0.1), now - Duration::seconds(700)),
            fill_at(dec!(100), dec!(101), dec!(0.1), dec!(0.1), now - Duration::seconds(10)),
        ];
        let history = tracker().slippage_history(&fills, now);
        assert_eq!(history, vec![dec!(1)]);
    }

    #[test]
    fn test_fee_spike_needs_consecutive_fills() {
        let now = Utc::now();
        // ratio 2.0 then 1.0: not consecutive.
        let fills = vec![
            fill_at(dec!(100), dec!(100), dec!(0.2), dec!(0.1), now),
            fill_at(dec!(100), dec!(100), dec!(0.1), dec!(0.1), now),
        ];
        assert!(!tracker().fee_spike(&fills));

        // Two most recent both at ratio 2.0.
        let fills = vec![
            fill_at(dec!(100), dec!(100), dec!(0.1), dec!(0.1), now),
            fill_at(dec!(100), dec!(100), dec!(0.2), dec!(0.1), now),
            fill_at(dec!(100), dec!(100), dec!(0.2), dec!(0.1), now),
        ];
        assert!(tracker().fee_spike(&fills));
    }

    #[test]
    fn test_slippage_breach_count() {
        let now = Utc::now();
        // 1% relative slippage breaches the 0.5% default; 0.1% does not.
        let fills = vec![
            fill_at(dec!(100), dec!(101), dec!(0.1), dec!(0.1), now),
            fill_at(dec!(100), dec!(100.1), dec!(0.1), dec!(0.1), now),
            fill_at(dec!(100), dec!(99), dec!(0.1), dec!(0.1), now),
        ];
        assert_eq!(tracker().slippage_breaches(&fills, now), 2);
    }

    #[test]
    fn test_week_start_on_monday_is_same_day() {
        let monday = utc(2026, 3, 2, 15, 0, 0);
        assert_eq!(utc_week_start(monday), utc(2026, 3, 2, 0, 0, 0));
    }
}
