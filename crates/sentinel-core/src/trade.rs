//! Immutable trade and fill history records.
//!
//! Consumed read-only by the session risk tracker; the core never holds
//! more history than its rolling windows need.

use crate::{Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed trade with realized PnL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Realized PnL in quote currency (positive = profit).
    pub pnl: Decimal,
    pub closed_at: DateTime<Utc>,
}

impl Trade {
    pub fn new(pnl: Decimal, closed_at: DateTime<Utc>) -> Self {
        Self { pnl, closed_at }
    }

    pub fn is_loss(&self) -> bool {
        self.pnl.is_sign_negative() && !self.pnl.is_zero()
    }
}

/// A single execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub qty: Size,
    /// Price the decision expected to fill at.
    pub expected_price: Price,
    /// Price actually filled at.
    pub filled_price: Price,
    /// Fee charged by the venue.
    pub fee: Decimal,
    /// Fee the sizing model estimated before submission.
    pub estimated_fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl FillEvent {
    /// Notional value of the fill at the executed price.
    pub fn notional(&self) -> Decimal {
        self.qty.notional(self.filled_price)
    }

    /// `fee / notional`; None for zero-notional fills (undefined ratio).
    pub fn fee_ratio(&self) -> Option<Decimal> {
        let notional = self.notional();
        if notional.is_zero() {
            return None;
        }
        Some(self.fee / notional)
    }

    /// `actual fee / estimated fee`; None if no estimate was recorded.
    pub fn fee_vs_estimate(&self) -> Option<Decimal> {
        if self.estimated_fee.is_zero() {
            return None;
        }
        Some(self.fee / self.estimated_fee)
    }

    /// Signed slippage: `filled - expected`.
    pub fn slippage(&self) -> Decimal {
        self.filled_price.inner() - self.expected_price.inner()
    }

    /// `|filled - expected| / expected`; None if expected price is zero.
    pub fn slippage_pct(&self) -> Option<Decimal> {
        if self.expected_price.is_zero() {
            return None;
        }
        Some(self.slippage().abs() / self.expected_price.inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(expected: Decimal, filled: Decimal, fee: Decimal) -> FillEvent {
        FillEvent {
            qty: Size::new(dec!(1)),
            expected_price: Price::new(expected),
            filled_price: Price::new(filled),
            fee,
            estimated_fee: dec!(10),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_fee_ratio_excludes_zero_notional() {
        let mut f = fill(dec!(100), dec!(100), dec!(0.1));
        assert_eq!(f.fee_ratio().unwrap(), dec!(0.001));

        f.qty = Size::ZERO;
        assert!(f.fee_ratio().is_none());
    }

    #[test]
    fn test_slippage() {
        let f = fill(dec!(100), dec!(101), dec!(0.1));
        assert_eq!(f.slippage(), dec!(1));
        assert_eq!(f.slippage_pct().unwrap(), dec!(0.01));
    }

    #[test]
    fn test_fee_vs_estimate() {
        let f = fill(dec!(100), dec!(100), dec!(16));
        assert_eq!(f.fee_vs_estimate().unwrap(), dec!(1.6));
    }

    #[test]
    fn test_trade_loss_classification() {
        assert!(Trade::new(dec!(-1), Utc::now()).is_loss());
        assert!(!Trade::new(dec!(0), Utc::now()).is_loss());
        assert!(!Trade::new(dec!(2), Utc::now()).is_loss());
    }
}
