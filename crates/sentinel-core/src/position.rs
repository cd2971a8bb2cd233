//! Position and pending-order records owned by the state machine.

use crate::order::{Direction, OrderRole, OrderSide, SignalId, StopStatus};
use crate::{Price, Size};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An open position. Created on a confirmed entry fill, destroyed on a
/// confirmed exit fill or HALT-triggered flattening.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Absolute quantity; direction carries the sign.
    pub qty: Size,
    pub entry_price: Price,
    pub direction: Direction,
    /// The signal that opened this position.
    pub signal: SignalId,
    pub stop_status: StopStatus,
    /// Stop trigger price, when a stop has been placed.
    pub stop_price: Option<Price>,
    pub opened_at: DateTime<Utc>,
}

impl Position {
    /// Open a fresh position from an entry fill. Stop starts as `Missing`
    /// so the next cycle is forced to place one.
    pub fn open(qty: Size, entry_price: Price, direction: Direction, signal: SignalId) -> Self {
        Self {
            qty,
            entry_price,
            direction,
            signal,
            stop_status: StopStatus::Missing,
            stop_price: None,
            opened_at: Utc::now(),
        }
    }

    /// Quantity signed by direction (positive long, negative short).
    pub fn signed_qty(&self) -> Decimal {
        self.qty.inner() * Decimal::from(self.direction.sign())
    }

    /// Mark a stop order as live at the given trigger price.
    pub fn stop_placed(&mut self, trigger: Price) {
        self.stop_status = StopStatus::Active;
        self.stop_price = Some(trigger);
    }
}

/// An order submitted (or being submitted) to the venue, tracked while the
/// state machine is in an entry/exit-pending state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Venue order identifier; absent if submission acknowledgment was lost.
    pub order_id: Option<String>,
    /// The idempotency key behind this order.
    pub signal: SignalId,
    pub role: OrderRole,
    pub side: OrderSide,
    pub qty: Size,
    /// Reference price at submission time.
    pub price: Price,
    pub submitted_at: DateTime<Utc>,
}

impl PendingOrder {
    pub fn new(signal: SignalId, role: OrderRole, side: OrderSide, qty: Size, price: Price) -> Self {
        Self {
            order_id: None,
            signal,
            role,
            side,
            qty,
            price,
            submitted_at: Utc::now(),
        }
    }

    /// Seconds elapsed since submission.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.submitted_at).num_seconds()
    }

    /// Whether a venue event with the given keys belongs to this order.
    ///
    /// Prefers the venue order id; falls back to the idempotency key, which
    /// covers the case where the submission ack was lost but the fill event
    /// still carries the original reference.
    pub fn matches(&self, order_id: Option<&str>, signal_key: Option<&str>) -> bool {
        if let (Some(own), Some(ev)) = (self.order_id.as_deref(), order_id) {
            return own == ev;
        }
        matches!(signal_key, Some(key) if key == self.signal.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn signal() -> SignalId {
        SignalId::derive(
            "grid_v2",
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            OrderSide::Buy,
        )
    }

    #[test]
    fn test_signed_qty() {
        let long = Position::open(
            Size::new(dec!(0.5)),
            Price::new(dec!(50000)),
            Direction::Long,
            signal(),
        );
        let short = Position::open(
            Size::new(dec!(0.5)),
            Price::new(dec!(50000)),
            Direction::Short,
            signal(),
        );
        assert_eq!(long.signed_qty(), dec!(0.5));
        assert_eq!(short.signed_qty(), dec!(-0.5));
    }

    #[test]
    fn test_new_position_needs_stop() {
        let pos = Position::open(
            Size::new(dec!(1)),
            Price::new(dec!(50000)),
            Direction::Long,
            signal(),
        );
        assert_eq!(pos.stop_status, StopStatus::Missing);
        assert!(pos.stop_price.is_none());
    }

    #[test]
    fn test_pending_matches_by_order_id_first() {
        let mut pending = PendingOrder::new(
            signal(),
            OrderRole::Entry,
            OrderSide::Buy,
            Size::new(dec!(1)),
            Price::new(dec!(50000)),
        );
        pending.order_id = Some("oid-1".to_string());

        assert!(pending.matches(Some("oid-1"), None));
        // Wrong order id does not fall through to the signal key.
        assert!(!pending.matches(Some("oid-2"), Some(pending.signal.as_str())));
    }

    #[test]
    fn test_pending_matches_by_signal_when_ack_lost() {
        let pending = PendingOrder::new(
            signal(),
            OrderRole::Entry,
            OrderSide::Buy,
            Size::new(dec!(1)),
            Price::new(dec!(50000)),
        );
        assert!(pending.order_id.is_none());
        assert!(pending.matches(Some("oid-9"), Some(pending.signal.as_str())));
        assert!(!pending.matches(None, Some("other")));
    }
}
