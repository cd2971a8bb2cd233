//! The per-instrument trading state machine.

use crate::error::{StateError, StateResult};
use crate::events::VenueEvent;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sentinel_core::{Direction, OrderSide, PendingOrder, Position, StopStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Lifecycle state of the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BotState {
    /// No position, no pending orders. Entries allowed.
    Flat,
    /// Entry order submitted, awaiting fill or cancel.
    EntryPending,
    /// Position open, protective stop maintained.
    InPosition,
    /// Exit order submitted, awaiting fill.
    ExitPending,
    /// Entries suppressed after a price collapse; auto-recoverable.
    Cooldown,
    /// Trading dead until manual reset.
    Halt,
}

impl fmt::Display for BotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Flat => "FLAT",
            Self::EntryPending => "ENTRY_PENDING",
            Self::InPosition => "IN_POSITION",
            Self::ExitPending => "EXIT_PENDING",
            Self::Cooldown => "COOLDOWN",
            Self::Halt => "HALT",
        };
        write!(f, "{}", s)
    }
}

/// One completed transition, for the audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    pub from: BotState,
    pub to: BotState,
    pub reason: String,
    /// Realized PnL when the transition closed a position.
    pub realized_pnl: Option<Decimal>,
    pub at: DateTime<Utc>,
}

impl TransitionOutcome {
    fn new(from: BotState, to: BotState, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            realized_pnl: None,
            at: Utc::now(),
        }
    }

    fn with_pnl(mut self, pnl: Decimal) -> Self {
        self.realized_pnl = Some(pnl);
        self
    }
}

/// The state machine. Position and pending-order records live here and
/// nowhere else; every mutation goes through a named transition.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: BotState,
    position: Option<Position>,
    pending: Option<PendingOrder>,
    halt_reason: Option<String>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: BotState::Flat,
            position: None,
            pending: None,
            halt_reason: None,
        }
    }

    /// Rebuild a machine from reconciled venue state at startup.
    pub fn restore(position: Option<Position>, pending: Option<PendingOrder>) -> Self {
        let state = match (&position, &pending) {
            (Some(_), Some(_)) => BotState::ExitPending,
            (Some(_), None) => BotState::InPosition,
            (None, Some(_)) => BotState::EntryPending,
            (None, None) => BotState::Flat,
        };
        Self {
            state,
            position,
            pending,
            halt_reason: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> BotState {
        self.state
    }

    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    #[must_use]
    pub fn pending(&self) -> Option<&PendingOrder> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn halt_reason(&self) -> Option<&str> {
        self.halt_reason.as_deref()
    }

    /// Stop status of the open position, if any.
    pub fn stop_status(&self) -> Option<StopStatus> {
        self.position.as_ref().map(|p| p.stop_status)
    }

    fn invalid(&self, action: &str) -> StateError {
        StateError::InvalidTransition {
            from: self.state.to_string(),
            action: action.to_string(),
        }
    }

    /// FLAT -> ENTRY_PENDING on entry submission.
    pub fn submit_entry(&mut self, pending: PendingOrder) -> StateResult<TransitionOutcome> {
        if self.state != BotState::Flat {
            return Err(self.invalid("submit_entry"));
        }
        let outcome = TransitionOutcome::new(
            self.state,
            BotState::EntryPending,
            format!("entry submitted for signal {}", pending.signal),
        );
        self.pending = Some(pending);
        self.state = BotState::EntryPending;
        Ok(outcome)
    }

    /// IN_POSITION -> EXIT_PENDING on exit submission. The exit must be
    /// on the side that reduces the open position.
    pub fn submit_exit(&mut self, pending: PendingOrder) -> StateResult<TransitionOutcome> {
        if self.state != BotState::InPosition {
            return Err(self.invalid("submit_exit"));
        }
        let position = self.position.as_ref().ok_or_else(|| {
            StateError::InvariantViolation("in position with no position record".into())
        })?;
        if pending.side != position.direction.exit_side() {
            return Err(self.invalid("submit_exit"));
        }
        let outcome = TransitionOutcome::new(
            self.state,
            BotState::ExitPending,
            format!("exit submitted for signal {}", pending.signal),
        );
        self.pending = Some(pending);
        self.state = BotState::ExitPending;
        Ok(outcome)
    }

    /// Attach the venue order id once the submission is acknowledged.
    pub fn record_ack(&mut self, order_id: String) {
        if let Some(pending) = self.pending.as_mut() {
            pending.order_id = Some(order_id);
        }
    }

    /// EXIT_PENDING -> IN_POSITION when the exit order could not be kept
    /// live (cancel confirmed, or replace failed and the order is gone).
    pub fn exit_abandoned(&mut self, reason: &str) -> StateResult<TransitionOutcome> {
        if self.state != BotState::ExitPending {
            return Err(self.invalid("exit_abandoned"));
        }
        warn!(reason, "exit abandoned, back to position management");
        self.pending = None;
        self.state = BotState::InPosition;
        Ok(TransitionOutcome::new(
            BotState::ExitPending,
            BotState::InPosition,
            reason,
        ))
    }

    /// Apply one venue event. Events that match neither the pending order
    /// nor the open position's stop are ignored (`Ok(None)`).
    pub fn apply_event(&mut self, event: &VenueEvent) -> StateResult<Option<TransitionOutcome>> {
        let pending_match = self
            .pending
            .as_ref()
            .is_some_and(|p| p.matches(event.order_id(), event.signal_key()));

        if pending_match {
            return self.apply_pending_event(event).map(Some);
        }

        // A fill keyed to the open position's signal with no matching
        // pending order is the protective stop firing.
        if self.state == BotState::InPosition {
            if let (VenueEvent::Filled { price, .. }, Some(pos)) = (event, self.position.as_ref()) {
                if event.signal_key() == Some(pos.signal.as_str()) {
                    let pnl = Self::realized_pnl(pos, price.inner());
                    info!(pnl = %pnl, "stop filled, position closed");
                    self.position = None;
                    self.state = BotState::Flat;
                    return Ok(Some(
                        TransitionOutcome::new(BotState::InPosition, BotState::Flat, "stop filled")
                            .with_pnl(pnl),
                    ));
                }
            }
        }

        Ok(None)
    }

    fn apply_pending_event(&mut self, event: &VenueEvent) -> StateResult<TransitionOutcome> {
        match self.state {
            BotState::EntryPending => match event {
                VenueEvent::Filled { price, qty, .. } => {
                    let pending = self.pending.take().ok_or_else(|| {
                        StateError::InvariantViolation("entry pending with no order".into())
                    })?;
                    let direction = match pending.side {
                        OrderSide::Buy => Direction::Long,
                        OrderSide::Sell => Direction::Short,
                    };
                    let position = Position::open(*qty, *price, direction, pending.signal);
                    info!(
                        price = %price,
                        qty = %qty,
                        direction = %direction,
                        "entry filled, position open"
                    );
                    self.position = Some(position);
                    self.state = BotState::InPosition;
                    Ok(TransitionOutcome::new(
                        BotState::EntryPending,
                        BotState::InPosition,
                        "entry filled",
                    ))
                }
                VenueEvent::Cancelled { .. } => {
                    self.pending = None;
                    self.state = BotState::Flat;
                    Ok(TransitionOutcome::new(
                        BotState::EntryPending,
                        BotState::Flat,
                        "entry cancelled",
                    ))
                }
                VenueEvent::Rejected { reason, .. } => {
                    warn!(reason, "entry rejected");
                    self.pending = None;
                    self.state = BotState::Flat;
                    Ok(TransitionOutcome::new(
                        BotState::EntryPending,
                        BotState::Flat,
                        format!("entry rejected: {}", reason),
                    ))
                }
            },
            BotState::ExitPending => match event {
                VenueEvent::Filled { price, .. } => {
                    let pos = self.position.take().ok_or_else(|| {
                        StateError::InvariantViolation("exit pending with no position".into())
                    })?;
                    let pnl = Self::realized_pnl(&pos, price.inner());
                    info!(pnl = %pnl, "exit filled, flat");
                    self.pending = None;
                    self.state = BotState::Flat;
                    Ok(TransitionOutcome::new(
                        BotState::ExitPending,
                        BotState::Flat,
                        "exit filled",
                    )
                    .with_pnl(pnl))
                }
                VenueEvent::Cancelled { .. } => self.exit_abandoned("exit cancelled at venue"),
                VenueEvent::Rejected { reason, .. } => {
                    self.exit_abandoned(&format!("exit rejected: {}", reason))
                }
            },
            BotState::Halt => match event {
                VenueEvent::Filled { price, qty, .. } => {
                    let pending = self.pending.take().ok_or_else(|| {
                        StateError::InvariantViolation("halted fill with no pending order".into())
                    })?;
                    match self.position.take() {
                        // The flatten (or a pre-halt exit) completed.
                        Some(pos) => {
                            let pnl = Self::realized_pnl(&pos, price.inner());
                            info!(pnl = %pnl, "position closed while halted");
                            Ok(TransitionOutcome::new(
                                BotState::Halt,
                                BotState::Halt,
                                "flatten filled while halted",
                            )
                            .with_pnl(pnl))
                        }
                        // An in-flight entry the halt could not un-submit.
                        // Track the exposure so the flatten path unwinds it.
                        None => {
                            let direction = match pending.side {
                                OrderSide::Buy => Direction::Long,
                                OrderSide::Sell => Direction::Short,
                            };
                            warn!(price = %price, qty = %qty, "entry filled while halted");
                            self.position =
                                Some(Position::open(*qty, *price, direction, pending.signal));
                            Ok(TransitionOutcome::new(
                                BotState::Halt,
                                BotState::Halt,
                                "entry filled while halted",
                            ))
                        }
                    }
                }
                VenueEvent::Cancelled { .. } | VenueEvent::Rejected { .. } => {
                    // Drop the record; if a position remains the next tick
                    // resubmits the flatten.
                    self.pending = None;
                    Ok(TransitionOutcome::new(
                        BotState::Halt,
                        BotState::Halt,
                        "order cancelled while halted",
                    ))
                }
            },
            _ => Err(self.invalid("apply_event")),
        }
    }

    fn realized_pnl(position: &Position, exit_price: Decimal) -> Decimal {
        (exit_price - position.entry_price.inner())
            * position.qty.inner()
            * Decimal::from(position.direction.sign())
    }

    /// Record a confirmed protective stop on the open position.
    pub fn mark_stop_placed(&mut self, trigger: sentinel_core::Price) -> StateResult<()> {
        match self.position.as_mut() {
            Some(position) if self.state == BotState::InPosition => {
                position.stop_placed(trigger);
                Ok(())
            }
            _ => Err(self.invalid("mark_stop_placed")),
        }
    }

    /// FLAT -> COOLDOWN after a price collapse.
    ///
    /// Only reachable while flat; with a position open the collapse is
    /// handled through position management instead.
    pub fn enter_cooldown(&mut self, reason: &str) -> StateResult<TransitionOutcome> {
        if self.state != BotState::Flat {
            return Err(self.invalid("enter_cooldown"));
        }
        self.state = BotState::Cooldown;
        Ok(TransitionOutcome::new(BotState::Flat, BotState::Cooldown, reason))
    }

    /// COOLDOWN -> FLAT after sustained recovery.
    pub fn leave_cooldown(&mut self, reason: &str) -> StateResult<TransitionOutcome> {
        if self.state != BotState::Cooldown {
            return Err(self.invalid("leave_cooldown"));
        }
        self.state = BotState::Flat;
        Ok(TransitionOutcome::new(BotState::Cooldown, BotState::Flat, reason))
    }

    /// Any state -> HALT. The position (if any) survives for flattening,
    /// and so does an in-flight order record: the caller cancels it at
    /// the venue, and an event or reconciliation resolves the race.
    pub fn halt(&mut self, reason: &str) -> TransitionOutcome {
        warn!(reason, from = %self.state, "entering HALT");
        let from = self.state;
        self.state = BotState::Halt;
        self.halt_reason = Some(reason.to_string());
        TransitionOutcome::new(from, BotState::Halt, reason)
    }

    /// Record the reduce-only flatten order submitted while halted.
    pub fn note_flatten(&mut self, pending: PendingOrder) -> StateResult<()> {
        if self.state != BotState::Halt || self.position.is_none() {
            return Err(self.invalid("note_flatten"));
        }
        self.pending = Some(pending);
        Ok(())
    }

    /// HALT -> FLAT. Manual, and only once the book is actually flat.
    pub fn reset(&mut self) -> StateResult<TransitionOutcome> {
        if self.state != BotState::Halt {
            return Err(self.invalid("reset"));
        }
        if self.position.is_some() {
            return Err(StateError::InvariantViolation(
                "cannot reset HALT with an open position".into(),
            ));
        }
        self.pending = None;
        self.halt_reason = None;
        self.state = BotState::Flat;
        Ok(TransitionOutcome::new(
            BotState::Halt,
            BotState::Flat,
            "manual reset",
        ))
    }

    /// Verify the structural invariants. Run after every tick.
    pub fn check_invariants(&self) -> StateResult<()> {
        let has_position = self.position.is_some();
        let has_pending = self.pending.is_some();

        let position_ok = match self.state {
            BotState::InPosition | BotState::ExitPending => has_position,
            BotState::Flat | BotState::EntryPending | BotState::Cooldown => !has_position,
            // A position may survive into HALT until the flatten fills.
            BotState::Halt => true,
        };
        if !position_ok {
            return Err(StateError::InvariantViolation(format!(
                "position presence {} inconsistent with state {}",
                has_position, self.state
            )));
        }

        let pending_ok = match self.state {
            BotState::EntryPending | BotState::ExitPending => has_pending,
            BotState::Flat | BotState::InPosition | BotState::Cooldown => !has_pending,
            // A flatten or a not-yet-cancelled in-flight order may ride
            // through HALT.
            BotState::Halt => true,
        };
        if !pending_ok {
            return Err(StateError::InvariantViolation(format!(
                "pending presence {} inconsistent with state {}",
                has_pending, self.state
            )));
        }

        // An exit order on the entry side would grow the position.
        if self.state == BotState::ExitPending {
            if let (Some(position), Some(pending)) = (&self.position, &self.pending) {
                if pending.side != position.direction.exit_side() {
                    return Err(StateError::InvariantViolation(format!(
                        "exit order side {} does not reduce a {} position",
                        pending.side, position.direction
                    )));
                }
            }
        }

        Ok(())
    }
}
