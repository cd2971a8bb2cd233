//! REST reconciliation.
//!
//! Resolves orders whose fate is unknown (lost acks, restarts, degraded
//! streams) by interrogating the venue directly. The verdict feeds the
//! state machine exactly as a live event would have.

use crate::error::ExecResult;
use crate::store::OrderRecord;
use crate::venue::{DynVenue, VenueExecution, VenueOrder, VenueOrderStatus};
use rust_decimal::Decimal;
use sentinel_core::{
    Direction, OrderRole, Position, Price, SignalId, Size, StopStatus,
};
use tracing::{info, warn};

/// Resolution of one unknown-fate order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The order is still resting at the venue.
    StillOpen {
        order_id: String,
    },
    /// The order filled while we were not looking.
    Filled {
        order_id: String,
        price: Price,
        qty: Size,
        fee: Decimal,
    },
    /// No trace of the order, but the venue reports a position. The order
    /// must have filled; the position record is rebuilt with its stop
    /// marked missing so the next cycle places one.
    PositionFound(Position),
    /// No order, no execution, no position. The order never reached the
    /// venue (or was cancelled); the reference can be retired.
    Gone,
}

/// State rebuilt from the venue at startup.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StartupState {
    pub position: Option<Position>,
    /// A live entry order found resting at the venue.
    pub open_entry: Option<VenueOrder>,
    /// A live stop order protecting the position.
    pub open_stop: Option<VenueOrder>,
}

/// Venue interrogator.
pub struct Reconciler {
    venue: DynVenue,
    symbol: String,
}

impl Reconciler {
    pub fn new(venue: DynVenue, symbol: impl Into<String>) -> Self {
        Self {
            venue,
            symbol: symbol.into(),
        }
    }

    /// Resolve the fate of `record`. Checks, in order: open orders,
    /// executions, then the position book.
    pub async fn reconcile_order(&self, record: &OrderRecord) -> ExecResult<ReconcileOutcome> {
        let open = self.venue.open_orders(&self.symbol).await?;
        if let Some(order) = open.iter().find(|o| Self::order_matches(record, o)) {
            return Ok(ReconcileOutcome::StillOpen {
                order_id: order.order_id.clone(),
            });
        }

        let executions = self.venue.executions(&self.symbol).await?;
        if let Some(execution) = executions
            .iter()
            .find(|e| Self::execution_matches(record, e))
        {
            info!(reference = %record.reference, order_id = %execution.order_id, "fill found by reconciliation");
            return Ok(ReconcileOutcome::Filled {
                order_id: execution.order_id.clone(),
                price: execution.price,
                qty: execution.qty,
                fee: execution.fee,
            });
        }

        // Executions carry the fee; the history endpoint only the average
        // price. Consulted second for fills, but it is the one source that
        // can prove a cancel or rejection.
        let history = self.venue.order_history(&self.symbol).await?;
        if let Some(order) = history.iter().find(|o| Self::order_matches(record, o)) {
            match order.status {
                VenueOrderStatus::Filled => {
                    if let Some(price) = order.avg_fill_price {
                        info!(reference = %record.reference, order_id = %order.order_id, "fill found in order history");
                        return Ok(ReconcileOutcome::Filled {
                            order_id: order.order_id.clone(),
                            price,
                            qty: order.filled_qty,
                            fee: Decimal::ZERO,
                        });
                    }
                }
                VenueOrderStatus::Cancelled | VenueOrderStatus::Rejected => {
                    return Ok(ReconcileOutcome::Gone);
                }
                VenueOrderStatus::Open => {}
            }
        }

        if let Some(venue_pos) = self.venue.position(&self.symbol).await? {
            if venue_pos.signed_qty != Decimal::ZERO {
                warn!(
                    reference = %record.reference,
                    qty = %venue_pos.signed_qty,
                    "no order trace but position exists, rebuilding"
                );
                return Ok(ReconcileOutcome::PositionFound(Self::rebuild_position(
                    venue_pos.signed_qty,
                    venue_pos.entry_price,
                    record.signal.clone(),
                )));
            }
        }

        Ok(ReconcileOutcome::Gone)
    }

    /// Rebuild local state from the venue after a restart.
    pub async fn reconcile_startup(&self) -> ExecResult<StartupState> {
        let mut state = StartupState::default();

        let open = self.venue.open_orders(&self.symbol).await?;
        for order in open {
            match Self::role_of(&order) {
                Some(OrderRole::Stop) => state.open_stop = Some(order),
                Some(OrderRole::Entry) | None => state.open_entry = Some(order),
            }
        }

        if let Some(venue_pos) = self.venue.position(&self.symbol).await? {
            if venue_pos.signed_qty != Decimal::ZERO {
                let signal = state
                    .open_stop
                    .as_ref()
                    .and_then(|o| o.reference.as_deref())
                    .and_then(|r| r.rsplit_once('-').map(|(s, _)| s.to_string()))
                    .map(SignalId::from_string)
                    .unwrap_or_else(|| SignalId::from_string("recovered".to_string()));

                let mut position =
                    Self::rebuild_position(venue_pos.signed_qty, venue_pos.entry_price, signal);
                if state.open_stop.is_some() {
                    position.stop_status = StopStatus::Active;
                }
                state.position = Some(position);
            }
        }

        Ok(state)
    }

    fn rebuild_position(signed_qty: Decimal, entry_price: Price, signal: SignalId) -> Position {
        let direction = if signed_qty > Decimal::ZERO {
            Direction::Long
        } else {
            Direction::Short
        };
        // Stop starts missing: reconciliation can prove a position exists
        // but never that its stop does.
        Position::open(Size::new(signed_qty.abs()), entry_price, direction, signal)
    }

    fn order_matches(record: &OrderRecord, order: &VenueOrder) -> bool {
        if let (Some(own), id) = (record.order_id.as_deref(), order.order_id.as_str()) {
            if own == id {
                return true;
            }
        }
        order.reference.as_deref() == Some(record.reference.as_str())
    }

    fn execution_matches(record: &OrderRecord, execution: &VenueExecution) -> bool {
        if let Some(own) = record.order_id.as_deref() {
            if own == execution.order_id {
                return true;
            }
        }
        execution.reference.as_deref() == Some(record.reference.as_str())
    }

    fn role_of(order: &VenueOrder) -> Option<OrderRole> {
        let reference = order.reference.as_deref()?;
        match reference.rsplit_once('-').map(|(_, suffix)| suffix) {
            Some("s") => Some(OrderRole::Stop),
            Some("e") => Some(OrderRole::Entry),
            _ => None,
        }
    }
}
