//! Immutable per-tick snapshot of market, account and connectivity state.
//!
//! A `Snapshot` is assembled once per control cycle by the market-data
//! collaborator and never mutated afterwards. Every safety evaluator is a
//! pure function over it.

use crate::Price;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market-side fields of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketView {
    /// Current mark price.
    pub price: Price,
    /// 1-minute price change as a fraction (e.g., -0.12 = 12% drop).
    pub drop_1m: Decimal,
    /// 5-minute price change as a fraction.
    pub drop_5m: Decimal,
    /// Volatility percentile (0-100) over the strategy's lookback.
    pub volatility_pct: Decimal,
}

/// Account-side fields of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountView {
    /// Total account equity in quote currency.
    pub equity: Decimal,
    /// Available margin in quote currency.
    pub available_margin: Decimal,
    /// When the balance figures were last refreshed from the venue.
    pub balance_updated_at: DateTime<Utc>,
}

/// Connectivity-health fields of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthView {
    /// p95 REST round-trip latency in milliseconds.
    pub rest_latency_p95_ms: i64,
    /// Age of the most recent stream heartbeat in milliseconds.
    pub heartbeat_age_ms: i64,
    /// Events the stream client knows it dropped since the last reset.
    pub dropped_events: u32,
}

/// Combined per-tick snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub market: MarketView,
    pub account: AccountView,
    pub health: HealthView,
    /// Wall-clock time the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(market: MarketView, account: AccountView, health: HealthView) -> Self {
        Self {
            market,
            account,
            health,
            timestamp: Utc::now(),
        }
    }

    /// Age of the balance figures relative to the snapshot clock, in seconds.
    pub fn balance_age_secs(&self) -> i64 {
        (self.timestamp - self.account.balance_updated_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn sample() -> Snapshot {
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

    #[test]
    fn test_balance_age() {
        let mut snap = sample();
        snap.account.balance_updated_at = snap.timestamp - Duration::seconds(45);
        assert_eq!(snap.balance_age_secs(), 45);
    }
}
