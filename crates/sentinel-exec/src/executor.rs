//! Idempotent order submission.
//!
//! The executor is the only path to `OrderVenue::place_order`. Every
//! submission reserves its reference in the order store first, so the
//! same signal can never produce two venue orders no matter how many
//! times a tick retries.

use crate::error::{ExecError, ExecResult};
use crate::store::{InsertOutcome, OrderRecord, OrderStore};
use crate::venue::{AmendOutcome, DynVenue, OrderAck, OrderRequest};
use sentinel_core::{OrderRef, OrderRole, OrderSide, Price, SignalId, Size};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Executor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Instrument this agent trades.
    #[serde(default = "default_symbol")]
    pub symbol: String,

    /// Venue limit on client order references.
    #[serde(default = "default_max_ref_len")]
    pub max_ref_len: usize,

    /// Unacked orders younger than this are left alone before
    /// reconciliation kicks in.
    #[serde(default = "default_ack_grace_secs")]
    pub ack_grace_secs: i64,
}

fn default_symbol() -> String {
    "BTC-PERP".to_string()
}
fn default_max_ref_len() -> usize {
    36
}
fn default_ack_grace_secs() -> i64 {
    30
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            max_ref_len: default_max_ref_len(),
            ack_grace_secs: default_ack_grace_secs(),
        }
    }
}

/// Result of an idempotent placement.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaceOutcome {
    /// Order submitted and acknowledged this call.
    Submitted(OrderAck),
    /// The reference already existed; no venue call was made.
    Reused(OrderRecord),
}

/// Places, amends and cancels orders through the venue, with the order
/// store as the idempotency barrier.
pub struct OrderExecutor {
    venue: DynVenue,
    store: Arc<dyn OrderStore>,
    config: ExecConfig,
}

impl OrderExecutor {
    pub fn new(venue: DynVenue, store: Arc<dyn OrderStore>, config: ExecConfig) -> Self {
        Self {
            venue,
            store,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &ExecConfig {
        &self.config
    }

    /// Submit an entry order for `signal`. Limit order at `price`.
    pub async fn place_entry(
        &self,
        signal: &SignalId,
        side: OrderSide,
        qty: Size,
        price: Price,
    ) -> ExecResult<PlaceOutcome> {
        self.place(signal, OrderRole::Entry, side, qty, Some(price), None, false)
            .await
    }

    /// Submit a reduce-only protective stop for `signal`.
    pub async fn place_stop(
        &self,
        signal: &SignalId,
        side: OrderSide,
        qty: Size,
        trigger: Price,
    ) -> ExecResult<PlaceOutcome> {
        self.place(signal, OrderRole::Stop, side, qty, None, Some(trigger), true)
            .await
    }

    /// Submit a reduce-only market order to flatten the position.
    pub async fn place_flatten(
        &self,
        signal: &SignalId,
        side: OrderSide,
        qty: Size,
    ) -> ExecResult<PlaceOutcome> {
        self.place(signal, OrderRole::Entry, side, qty, None, None, true)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn place(
        &self,
        signal: &SignalId,
        role: OrderRole,
        side: OrderSide,
        qty: Size,
        price: Option<Price>,
        trigger: Option<Price>,
        reduce_only: bool,
    ) -> ExecResult<PlaceOutcome> {
        let reference = OrderRef::new(signal, role, self.config.max_ref_len)?;

        // Reserve the reference before the venue sees anything.
        let record = OrderRecord::new(reference.clone(), signal.clone(), role, side, qty, price);
        if let InsertOutcome::Existing(existing) = self.store.try_insert(record) {
            info!(reference = %reference, "reference already submitted, reusing record");
            return Ok(PlaceOutcome::Reused(existing));
        }

        let request = OrderRequest {
            symbol: self.config.symbol.clone(),
            reference: reference.clone(),
            side,
            qty,
            price,
            trigger,
            reduce_only,
        };

        match self.venue.place_order(request).await {
            Ok(ack) => {
                self.store.mark_acked(&reference, &ack.order_id);
                info!(reference = %reference, order_id = %ack.order_id, role = %role, "order placed");
                Ok(PlaceOutcome::Submitted(ack))
            }
            Err(err) if err.is_ambiguous() => {
                // The order may exist at the venue. Keep the reservation;
                // reconciliation will resolve it.
                warn!(reference = %reference, error = %err, "ambiguous placement failure, keeping reservation");
                Err(err)
            }
            Err(err) => {
                // Definitive rejection: the order does not exist. Free the
                // reference so a corrected retry can use a fresh decision.
                self.store.remove(&reference);
                warn!(reference = %reference, error = %err, "placement rejected");
                Err(err)
            }
        }
    }

    /// Amend an order's quantity (and optionally trigger) in place.
    /// `NotModified` counts as success.
    pub async fn amend(
        &self,
        order_id: &str,
        qty: Size,
        trigger: Option<Price>,
    ) -> ExecResult<AmendOutcome> {
        self.venue.amend_order(order_id, qty, trigger).await
    }

    pub async fn cancel(&self, order_id: &str) -> ExecResult<()> {
        self.venue.cancel_order(order_id).await
    }
}
