//! Venue REST abstraction.
//!
//! Dyn-compatible trait so the executor and reconciler can be driven by
//! a mock in tests and by the real HTTP client in production.

use crate::error::ExecResult;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sentinel_core::{OrderRef, OrderSide, Price, Size};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// An order submission request.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub reference: OrderRef,
    pub side: OrderSide,
    pub qty: Size,
    /// Limit price; `None` submits at market.
    pub price: Option<Price>,
    /// Stop trigger price for conditional orders.
    pub trigger: Option<Price>,
    /// Reduce-only orders can never increase exposure.
    pub reduce_only: bool,
}

/// Venue acknowledgment of a submitted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAck {
    pub order_id: String,
    pub reference: OrderRef,
}

/// Result of an amend request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmendOutcome {
    Amended,
    /// The order already had the requested parameters. Treated as success.
    NotModified,
}

/// Order status as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueOrderStatus {
    Open,
    Filled,
    Cancelled,
    Rejected,
}

/// An order row from the venue's open-orders or history endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueOrder {
    pub order_id: String,
    /// Client reference, when the venue echoes it back.
    pub reference: Option<String>,
    pub status: VenueOrderStatus,
    pub side: OrderSide,
    pub qty: Size,
    pub filled_qty: Size,
    pub avg_fill_price: Option<Price>,
}

/// One execution (fill) row.
#[derive(Debug, Clone, PartialEq)]
pub struct VenueExecution {
    pub order_id: String,
    pub reference: Option<String>,
    pub price: Price,
    pub qty: Size,
    pub fee: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Position as reported by the venue (signed quantity).
#[derive(Debug, Clone, PartialEq)]
pub struct VenuePosition {
    pub symbol: String,
    /// Positive long, negative short, zero flat.
    pub signed_qty: Decimal,
    pub entry_price: Price,
}

/// REST surface of the venue the agent needs.
pub trait OrderVenue: Send + Sync {
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, ExecResult<OrderAck>>;

    fn amend_order(
        &self,
        order_id: &str,
        new_qty: Size,
        new_trigger: Option<Price>,
    ) -> BoxFuture<'_, ExecResult<AmendOutcome>>;

    fn cancel_order(&self, order_id: &str) -> BoxFuture<'_, ExecResult<()>>;

    fn open_orders(&self, symbol: &str) -> BoxFuture<'_, ExecResult<Vec<VenueOrder>>>;

    fn order_history(&self, symbol: &str) -> BoxFuture<'_, ExecResult<Vec<VenueOrder>>>;

    fn executions(&self, symbol: &str) -> BoxFuture<'_, ExecResult<Vec<VenueExecution>>>;

    fn position(&self, symbol: &str) -> BoxFuture<'_, ExecResult<Option<VenuePosition>>>;
}

/// Arc wrapper for venue trait objects.
pub type DynVenue = Arc<dyn OrderVenue>;

/// Scriptable venue mock for tests.
///
/// Responses are queued per endpoint; calls are recorded for verification.
/// An empty queue yields the endpoint's neutral response (empty lists, no
/// position) so tests only script what they care about.
#[derive(Debug, Default)]
pub struct MockVenue {
    place_calls: parking_lot::Mutex<Vec<OrderRequest>>,
    amend_calls: parking_lot::Mutex<Vec<(String, Size)>>,
    cancel_calls: parking_lot::Mutex<Vec<String>>,

    place_results: parking_lot::Mutex<VecDeque<ExecResult<OrderAck>>>,
    amend_results: parking_lot::Mutex<VecDeque<ExecResult<AmendOutcome>>>,
    cancel_results: parking_lot::Mutex<VecDeque<ExecResult<()>>>,
    open_orders: parking_lot::Mutex<Vec<VenueOrder>>,
    history: parking_lot::Mutex<Vec<VenueOrder>>,
    executions: parking_lot::Mutex<Vec<VenueExecution>>,
    position: parking_lot::Mutex<Option<VenuePosition>>,
}

impl MockVenue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_place(&self, result: ExecResult<OrderAck>) {
        self.place_results.lock().push_back(result);
    }

    pub fn queue_amend(&self, result: ExecResult<AmendOutcome>) {
        self.amend_results.lock().push_back(result);
    }

    pub fn queue_cancel(&self, result: ExecResult<()>) {
        self.cancel_results.lock().push_back(result);
    }

    pub fn set_open_orders(&self, orders: Vec<VenueOrder>) {
        *self.open_orders.lock() = orders;
    }

    pub fn set_history(&self, orders: Vec<VenueOrder>) {
        *self.history.lock() = orders;
    }

    pub fn set_executions(&self, executions: Vec<VenueExecution>) {
        *self.executions.lock() = executions;
    }

    pub fn set_position(&self, position: Option<VenuePosition>) {
        *self.position.lock() = position;
    }

    pub fn place_calls(&self) -> Vec<OrderRequest> {
        self.place_calls.lock().clone()
    }

    pub fn amend_calls(&self) -> Vec<(String, Size)> {
        self.amend_calls.lock().clone()
    }

    pub fn cancel_calls(&self) -> Vec<String> {
        self.cancel_calls.lock().clone()
    }
}

impl OrderVenue for MockVenue {
    fn place_order(&self, request: OrderRequest) -> BoxFuture<'_, ExecResult<OrderAck>> {
        Box::pin(async move {
            let reference = request.reference.clone();
            self.place_calls.lock().push(request);
            self.place_results.lock().pop_front().unwrap_or_else(|| {
                Ok(OrderAck {
                    order_id: format!("mock-{}", reference.as_str()),
                    reference,
                })
            })
        })
    }

    fn amend_order(
        &self,
        order_id: &str,
        new_qty: Size,
        _new_trigger: Option<Price>,
    ) -> BoxFuture<'_, ExecResult<AmendOutcome>> {
        let order_id = order_id.to_string();
        Box::pin(async move {
            self.amend_calls.lock().push((order_id, new_qty));
            self.amend_results
                .lock()
                .pop_front()
                .unwrap_or(Ok(AmendOutcome::Amended))
        })
    }

    fn cancel_order(&self, order_id: &str) -> BoxFuture<'_, ExecResult<()>> {
        let order_id = order_id.to_string();
        Box::pin(async move {
            self.cancel_calls.lock().push(order_id);
            self.cancel_results.lock().pop_front().unwrap_or(Ok(()))
        })
    }

    fn open_orders(&self, _symbol: &str) -> BoxFuture<'_, ExecResult<Vec<VenueOrder>>> {
        Box::pin(async move { Ok(self.open_orders.lock().clone()) })
    }

    fn order_history(&self, _symbol: &str) -> BoxFuture<'_, ExecResult<Vec<VenueOrder>>> {
        Box::pin(async move { Ok(self.history.lock().clone()) })
    }

    fn executions(&self, _symbol: &str) -> BoxFuture<'_, ExecResult<Vec<VenueExecution>>> {
        Box::pin(async move { Ok(self.executions.lock().clone()) })
    }

    fn position(&self, _symbol: &str) -> BoxFuture<'_, ExecResult<Option<VenuePosition>>> {
        Box::pin(async move { Ok(self.position.lock().clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use sentinel_core::{OrderRole, SignalId};

    fn request() -> OrderRequest {
        let signal = SignalId::derive(
            "grid_v2",
            Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap(),
            OrderSide::Buy,
        );
        OrderRequest {
            symbol: "BTC-PERP".to_string(),
            reference: OrderRef::new(&signal, OrderRole::Entry, 36).unwrap(),
            side: OrderSide::Buy,
            qty: Size::new(dec!(0.5)),
            price: Some(Price::new(dec!(50000))),
            trigger: None,
            reduce_only: false,
        }
    }

    #[tokio::test]
    async fn test_mock_records_and_replays() {
        let venue = MockVenue::new();
        venue.queue_place(Err(ExecError::Timeout("place".into())));

        let result = venue.place_order(request()).await;
        assert!(result.is_err());
        assert_eq!(venue.place_calls().len(), 1);

        // Queue drained: default ack.
        let ack = venue.place_order(request()).await.unwrap();
        assert!(ack.order_id.starts_with("mock-"));
    }

    #[tokio::test]
    async fn test_mock_neutral_defaults() {
        let venue = MockVenue::new();
        assert!(venue.open_orders("BTC-PERP").await.unwrap().is_empty());
        assert!(venue.position("BTC-PERP").await.unwrap().is_none());
    }
}
