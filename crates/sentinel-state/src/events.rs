//! Venue events consumed by the state machine.

use chrono::{DateTime, Utc};
use sentinel_core::{OrderRef, Price, Size};
use serde::{Deserialize, Serialize};

/// An order lifecycle event received from the venue stream.
///
/// Either key may be absent: `order_id` when the submission ack was lost
/// before the venue id arrived, `order_ref` when the venue strips client
/// references from certain event types. The state machine matches on
/// whichever is available, id first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VenueEvent {
    Filled {
        order_id: Option<String>,
        order_ref: Option<OrderRef>,
        price: Price,
        qty: Size,
        fee: rust_decimal::Decimal,
        timestamp: DateTime<Utc>,
    },
    Cancelled {
        order_id: Option<String>,
        order_ref: Option<OrderRef>,
        timestamp: DateTime<Utc>,
    },
    Rejected {
        order_id: Option<String>,
        order_ref: Option<OrderRef>,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl VenueEvent {
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::Filled { order_id, .. }
            | Self::Cancelled { order_id, .. }
            | Self::Rejected { order_id, .. } => order_id.as_deref(),
        }
    }

    pub fn order_ref(&self) -> Option<&OrderRef> {
        match self {
            Self::Filled { order_ref, .. }
            | Self::Cancelled { order_ref, .. }
            | Self::Rejected { order_ref, .. } => order_ref.as_ref(),
        }
    }

    /// The idempotency key embedded in the client reference, if present.
    pub fn signal_key(&self) -> Option<&str> {
        self.order_ref().map(|r| r.signal_part())
    }
}
