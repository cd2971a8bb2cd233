//! The per-tick decision sequence.
//!
//! Phases run in a fixed order every cycle:
//! kill switch, connectivity, emergency gates, venue events, position
//! management, entry. Later phases only run to the extent earlier phases
//! allow; the orchestrator owns every continuity timestamp (degraded
//! since, recovery held since, re-entry cooldowns) so the gate
//! evaluators themselves stay pure.

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::killswitch::KillSwitch;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sentinel_core::{
    FillEvent, GateVerdict, OrderRef, OrderRole, OrderSide, PendingOrder, Position, Price,
    SignalId, Size, Snapshot, StopStatus, Trade, TransitionContext, TransitionRecord,
};
use sentinel_exec::{
    DynVenue, ExecError, OrderExecutor, OrderStore, PlaceOutcome, ReconcileOutcome, Reconciler,
};
use sentinel_risk::{
    ConnectivityMonitor, EmergencyGateChain, EntryRisk, FeeTightening, HealthVerdict,
    LiquidationGate, PreTradeDecision, SessionRiskTracker,
};
use sentinel_state::{BotState, StateMachine, TransitionOutcome, VenueEvent};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A candidate entry produced by the strategy for this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    /// Close time of the bar that produced the decision; part of the
    /// idempotency key.
    pub bar_close: DateTime<Utc>,
    pub side: OrderSide,
    pub qty: Size,
    pub limit_price: Price,
    pub stop_price: Price,
    /// Expected edge as a fraction of notional.
    pub expected_edge_pct: Decimal,
    pub risk: EntryRisk,
}

/// Everything one tick consumes.
#[derive(Debug, Clone)]
pub struct TickInputs {
    pub snapshot: Snapshot,
    /// Venue events drained from the stream since the last tick.
    pub events: Vec<VenueEvent>,
    /// Closed-trade history, oldest first.
    pub trades: Vec<Trade>,
    /// Fill history, oldest first.
    pub fills: Vec<FillEvent>,
    pub entry: Option<EntrySignal>,
    /// Strategy wants the whole position closed this tick.
    pub exit: bool,
}

/// Phases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickPhase {
    KillSwitch,
    Connectivity,
    Emergency,
    Events,
    PositionManagement,
    Entry,
}

/// What one tick did.
#[derive(Debug, Clone)]
pub struct TickResult {
    pub state: BotState,
    pub phases: Vec<TickPhase>,
    pub transitions: Vec<TransitionOutcome>,
    /// Why the entry signal (if any) was not submitted.
    pub entry_block: Option<String>,
}

/// The protective stop believed live at the venue.
#[derive(Debug, Clone)]
struct LiveStop {
    order_id: String,
    qty: Size,
}

/// Drives one instrument through the decision sequence.
pub struct TickOrchestrator {
    config: EngineConfig,
    machine: StateMachine,
    executor: OrderExecutor,
    reconciler: Reconciler,
    store: Arc<dyn OrderStore>,
    chain: EmergencyGateChain,
    tracker: SessionRiskTracker,
    monitor: ConnectivityMonitor,
    liq_gate: LiquidationGate,
    fee_tightening: FeeTightening,
    kill_switch: KillSwitch,

    degraded_since: Option<DateTime<Utc>>,
    degraded_recovered_at: Option<DateTime<Utc>>,
    recovery_held_since: Option<DateTime<Utc>>,
    cooldown_exited_at: Option<DateTime<Utc>>,
    /// Stop price the strategy asked for with the current entry.
    planned_stop: Option<Price>,
    live_stop: Option<LiveStop>,
}

impl TickOrchestrator {
    pub fn new(config: EngineConfig, venue: DynVenue, store: Arc<dyn OrderStore>) -> Self {
        let executor = OrderExecutor::new(venue.clone(), store.clone(), config.exec.clone());
        let reconciler = Reconciler::new(venue, config.exec.symbol.clone());
        let chain = EmergencyGateChain::new(config.risk.clone(), config.connectivity.clone());
        let tracker = SessionRiskTracker::new(config.risk.clone());
        let monitor = ConnectivityMonitor::new(config.connectivity.clone());
        let kill_switch = KillSwitch::new(config.kill_switch_path.clone());

        Self {
            config,
            machine: StateMachine::new(),
            executor,
            reconciler,
            store,
            chain,
            tracker,
            monitor,
            liq_gate: LiquidationGate,
            fee_tightening: FeeTightening::new(),
            kill_switch,
            degraded_since: None,
            degraded_recovered_at: None,
            recovery_held_since: None,
            cooldown_exited_at: None,
            planned_stop: None,
            live_stop: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> BotState {
        self.machine.state()
    }

    #[must_use]
    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// Rebuild local state from the venue. Run once before the first tick.
    pub async fn bootstrap(&mut self) -> EngineResult<()> {
        let startup = self.reconciler.reconcile_startup().await?;
        let pending = startup.open_entry.as_ref().and_then(|order| {
            let reference = order.reference.as_deref()?;
            let signal = reference.rsplit_once('-').map(|(s, _)| s.to_string())?;
            let mut p = PendingOrder::new(
                SignalId::from_string(signal),
                OrderRole::Entry,
                order.side,
                order.qty,
                order.avg_fill_price.unwrap_or(Price::ZERO),
            );
            p.order_id = Some(order.order_id.clone());
            Some(p)
        });
        self.live_stop = match (&startup.position, &startup.open_stop) {
            (Some(_), Some(stop)) => Some(LiveStop {
                order_id: stop.order_id.clone(),
                qty: stop.qty,
            }),
            _ => None,
        };
        self.machine = StateMachine::restore(startup.position, pending);
        info!(state = %self.machine.state(), "state rebuilt from venue");
        Ok(())
    }

    /// Manually clear a HALT. Refused while a position is still open.
    pub fn reset_halt(&mut self) -> EngineResult<()> {
        let outcome = self.machine.reset()?;
        info!(reason = %outcome.reason, "halt cleared");
        Ok(())
    }

    /// Run one decision cycle.
    pub async fn run_tick(&mut self, inputs: TickInputs) -> EngineResult<TickResult> {
        let now = inputs.snapshot.timestamp;
        let mut phases = Vec::with_capacity(6);
        let mut transitions = Vec::new();
        let mut entry_block = None;

        // Phase 1: kill switch.
        phases.push(TickPhase::KillSwitch);
        let killed = self.kill_switch.engaged();
        if killed && self.machine.state() != BotState::Halt {
            self.halt_and_cancel("kill switch engaged", &mut transitions)
                .await;
        }

        // Phase 2: connectivity.
        phases.push(TickPhase::Connectivity);
        let verdict = self.update_connectivity(&inputs.snapshot, now);
        let degraded_for = self.degraded_since.map(|since| (now - since).num_seconds());

        // Phase 3: emergency gates.
        phases.push(TickPhase::Emergency);
        let metrics = self.tracker.metrics(&inputs.trades, &inputs.fills, now);
        if metrics.fee_spike {
            self.fee_tightening.note_spike(now);
        }
        let status = self.chain.evaluate(&inputs.snapshot, &metrics, degraded_for);
        self.apply_emergency(&status, &inputs.snapshot, now, &mut transitions)
            .await?;

        // Phase 4: venue events, then reconciliation of stale orders.
        phases.push(TickPhase::Events);
        for event in &inputs.events {
            if let Some(outcome) = self.machine.apply_event(event)? {
                transitions.push(outcome);
            }
        }
        self.reconcile_stale_pending(now, &mut transitions).await?;

        // The book went flat: any resting stop is now an orphan.
        if self.machine.position().is_none() {
            if let Some(stop) = self.live_stop.take() {
                if let Err(err) = self.executor.cancel(&stop.order_id).await {
                    // The stop may have been the closer; nothing to undo.
                    debug!(order_id = %stop.order_id, error = %err, "orphaned stop cancel failed");
                }
            }
        }

        // Phase 5: position management (or HALT flattening).
        phases.push(TickPhase::PositionManagement);
        match self.machine.state() {
            BotState::Halt => self.flatten_if_needed(&inputs.snapshot).await?,
            BotState::InPosition if inputs.exit => {
                self.begin_exit(&inputs.snapshot, now, &mut transitions).await?
            }
            BotState::InPosition => self.maintain_stop().await?,
            _ => {}
        }

        // Phase 6: entry.
        phases.push(TickPhase::Entry);
        if let Some(entry) = &inputs.entry {
            entry_block = self
                .try_entry(entry, &status, &verdict, now, &mut transitions)
                .await?;
            if let Some(reason) = &entry_block {
                debug!(reason = %reason, "entry suppressed");
            }
        }

        // A machine left in a contradictory shape must not keep trading;
        // latch HALT instead of surfacing a tick error and carrying on.
        if let Err(violation) = self.machine.check_invariants() {
            error!(error = %violation, "state invariant violated");
            self.halt_and_cancel(&format!("invariant violation: {violation}"), &mut transitions)
                .await;
        }
        self.audit(&transitions, &inputs.snapshot)?;

        Ok(TickResult {
            state: self.machine.state(),
            phases,
            transitions,
            entry_block,
        })
    }

    fn update_connectivity(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> HealthVerdict {
        let verdict = self.monitor.check_health(&snapshot.health);
        if verdict.is_degraded {
            if self.degraded_since.is_none() {
                warn!(reason = %verdict.reason, "stream entered degraded");
                self.degraded_since = Some(now);
            }
        } else if self.degraded_since.is_some() && self.monitor.check_recovery(&snapshot.health) {
            info!("stream recovered, entry cooldown started");
            self.degraded_since = None;
            self.degraded_recovered_at = Some(now);
        }
        verdict
    }

    /// Latch HALT and request a cancel of whatever order is in flight.
    /// The machine keeps the pending record either way; the cancel event
    /// or reconciliation resolves the race with a fill.
    async fn halt_and_cancel(&mut self, reason: &str, transitions: &mut Vec<TransitionOutcome>) {
        transitions.push(self.machine.halt(reason));
        let order_id = self.machine.pending().and_then(|p| p.order_id.clone());
        if let Some(order_id) = order_id {
            match self.executor.cancel(&order_id).await {
                Ok(()) => info!(order_id = %order_id, "in-flight order cancel requested on halt"),
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "cancel on halt failed, reconciliation will resolve")
                }
            }
        }
    }

    async fn apply_emergency(
        &mut self,
        status: &GateVerdict,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        transitions: &mut Vec<TransitionOutcome>,
    ) -> EngineResult<()> {
        if status.is_halt() {
            if self.machine.state() != BotState::Halt {
                self.halt_and_cancel(&status.reason, transitions).await;
            }
            return Ok(());
        }

        if status.is_cooldown() && self.machine.state() == BotState::Flat {
            transitions.push(self.machine.enter_cooldown(&status.reason)?);
            self.recovery_held_since = None;
        }

        if self.machine.state() == BotState::Cooldown {
            let recovery = self
                .chain
                .evaluate_recovery(snapshot, self.recovery_held_since, now);
            if recovery.conditions_hold {
                if self.recovery_held_since.is_none() {
                    self.recovery_held_since = Some(now);
                }
                if recovery.recovered {
                    transitions.push(self.machine.leave_cooldown("price recovery sustained")?);
                    self.cooldown_exited_at = Some(now);
                    self.recovery_held_since = None;
                }
            } else {
                // Continuity broken; the dwell starts over.
                self.recovery_held_since = None;
            }
        }

        Ok(())
    }

    /// Resolve a pending order whose ack has been outstanding too long.
    async fn reconcile_stale_pending(
        &mut self,
        now: DateTime<Utc>,
        transitions: &mut Vec<TransitionOutcome>,
    ) -> EngineResult<()> {
        let Some(pending) = self.machine.pending().cloned() else {
            return Ok(());
        };
        if pending.age_secs(now) < self.config.exec.ack_grace_secs {
            return Ok(());
        }

        let reference = OrderRef::new(&pending.signal, pending.role, self.config.exec.max_ref_len)?;
        let Some(record) = self.store.get(&reference) else {
            return Ok(());
        };

        match self.reconciler.reconcile_order(&record).await? {
            ReconcileOutcome::StillOpen { order_id } => {
                self.store.mark_acked(&reference, &order_id);
                self.machine.record_ack(order_id);
            }
            ReconcileOutcome::Filled {
                order_id,
                price,
                qty,
                fee,
            } => {
                let event = VenueEvent::Filled {
                    order_id: Some(order_id),
                    order_ref: Some(reference),
                    price,
                    qty,
                    fee,
                    timestamp: now,
                };
                if let Some(outcome) = self.machine.apply_event(&event)? {
                    transitions.push(outcome);
                }
            }
            ReconcileOutcome::PositionFound(position) => {
                if position.direction.entry_side() == pending.side {
                    // No execution row, but the position proves the
                    // entry filled.
                    let event = VenueEvent::Filled {
                        order_id: None,
                        order_ref: Some(reference),
                        price: position.entry_price,
                        qty: position.qty,
                        fee: Decimal::ZERO,
                        timestamp: now,
                    };
                    if let Some(outcome) = self.machine.apply_event(&event)? {
                        transitions.push(outcome);
                    }
                } else {
                    // Exit-side order with the position still on the
                    // book: the submission never took effect. Keep the
                    // position and free the reference so the next cycle
                    // resubmits.
                    warn!(reference = %reference, "exit-side order vanished but position remains");
                    let event = VenueEvent::Cancelled {
                        order_id: None,
                        order_ref: Some(reference.clone()),
                        timestamp: now,
                    };
                    if let Some(outcome) = self.machine.apply_event(&event)? {
                        transitions.push(outcome);
                    }
                    self.store.remove(&reference);
                }
            }
            ReconcileOutcome::Gone => {
                let event = VenueEvent::Cancelled {
                    order_id: None,
                    order_ref: Some(reference.clone()),
                    timestamp: now,
                };
                if let Some(outcome) = self.machine.apply_event(&event)? {
                    transitions.push(outcome);
                }
                // The order never took effect; free the reference.
                self.store.remove(&reference);
            }
        }
        Ok(())
    }

    /// Submit (or re-submit) the reduce-only flatten order while halted.
    async fn flatten_if_needed(&mut self, snapshot: &Snapshot) -> EngineResult<()> {
        let Some(position) = self.machine.position().cloned() else {
            return Ok(());
        };
        if self.machine.pending().is_some() {
            return Ok(());
        }

        let side = position.direction.exit_side();
        // Keyed off the owning signal only, so retries and restarts
        // (which re-stamp the position record) reuse the same reference.
        let signal = position.signal.derive_related("flatten");

        match self.executor.place_flatten(&signal, side, position.qty).await {
            Ok(outcome) => {
                let mut pending = PendingOrder::new(
                    signal,
                    OrderRole::Entry,
                    side,
                    position.qty,
                    snapshot.market.price,
                );
                pending.order_id = match &outcome {
                    PlaceOutcome::Submitted(ack) => Some(ack.order_id.clone()),
                    PlaceOutcome::Reused(record) => record.order_id.clone(),
                };
                self.machine.note_flatten(pending)?;
                info!(qty = %position.qty, side = %side, "flatten order live");
            }
            Err(err) => {
                // Next tick retries; the store reservation guards doubles.
                warn!(error = %err, "flatten submission failed");
            }
        }
        Ok(())
    }

    /// Keep the protective stop in lockstep with the position: place one
    /// when missing, amend when the live order's size has drifted (a
    /// partial close found at startup), cancel and recreate where the
    /// venue cannot amend.
    async fn maintain_stop(&mut self) -> EngineResult<()> {
        let Some(position) = self.machine.position().cloned() else {
            return Ok(());
        };
        if position.stop_status == StopStatus::Missing {
            return self.place_missing_stop(&position).await;
        }

        let Some(stop) = self.live_stop.clone() else {
            return Ok(());
        };
        if stop.qty == position.qty {
            return Ok(());
        }

        match self
            .executor
            .amend(&stop.order_id, position.qty, position.stop_price)
            .await
        {
            Ok(_) => {
                info!(order_id = %stop.order_id, qty = %position.qty, "stop amended to position size");
                self.live_stop = Some(LiveStop {
                    order_id: stop.order_id,
                    qty: position.qty,
                });
            }
            Err(ExecError::AmendUnsupported(_)) => {
                warn!(order_id = %stop.order_id, "venue cannot amend, recreating stop");
                if let Err(err) = self.executor.cancel(&stop.order_id).await {
                    warn!(error = %err, "stop cancel failed, retrying next tick");
                    return Ok(());
                }
                let reference =
                    OrderRef::new(&position.signal, OrderRole::Stop, self.config.exec.max_ref_len)?;
                self.store.remove(&reference);
                self.live_stop = None;
                self.place_missing_stop(&position).await?;
            }
            Err(err) => {
                warn!(error = %err, "stop amend failed, retrying next tick");
            }
        }
        Ok(())
    }

    async fn place_missing_stop(&mut self, position: &Position) -> EngineResult<()> {
        let trigger = self.stop_trigger(position);
        match self
            .executor
            .place_stop(
                &position.signal,
                position.direction.exit_side(),
                position.qty,
                trigger,
            )
            .await
        {
            Ok(outcome) => {
                let order_id = match &outcome {
                    PlaceOutcome::Submitted(ack) => Some(ack.order_id.clone()),
                    PlaceOutcome::Reused(record) => record.order_id.clone(),
                };
                if let Some(order_id) = order_id {
                    self.live_stop = Some(LiveStop {
                        order_id,
                        qty: position.qty,
                    });
                }
                self.machine.mark_stop_placed(trigger)?;
                self.planned_stop = None;
                info!(trigger = %trigger, "protective stop live");
            }
            Err(err) => {
                warn!(error = %err, "stop placement failed, retrying next tick");
            }
        }
        Ok(())
    }

    fn stop_trigger(&self, position: &Position) -> Price {
        position.stop_price.or(self.planned_stop).unwrap_or_else(|| {
            // Recovered position with no known stop: fall back to the
            // configured distance.
            let offset = Decimal::from(position.direction.sign()) * self.config.stop_distance_pct;
            position.entry_price * (Decimal::ONE - offset)
        })
    }

    /// Submit a reduce-only market exit for the whole position.
    async fn begin_exit(
        &mut self,
        snapshot: &Snapshot,
        now: DateTime<Utc>,
        transitions: &mut Vec<TransitionOutcome>,
    ) -> EngineResult<()> {
        let Some(position) = self.machine.position().cloned() else {
            return Ok(());
        };
        let side = position.direction.exit_side();
        let signal = position.signal.derive_related("exit");

        let mut pending = PendingOrder::new(
            signal.clone(),
            OrderRole::Entry,
            side,
            position.qty,
            snapshot.market.price,
        );
        pending.submitted_at = now;
        transitions.push(self.machine.submit_exit(pending)?);

        match self.executor.place_flatten(&signal, side, position.qty).await {
            Ok(PlaceOutcome::Submitted(ack)) => {
                self.machine.record_ack(ack.order_id);
                info!(qty = %position.qty, side = %side, "exit order live");
            }
            Ok(PlaceOutcome::Reused(record)) => {
                if let Some(order_id) = record.order_id {
                    self.machine.record_ack(order_id);
                }
            }
            Err(err) if err.is_ambiguous() => {
                warn!(error = %err, "exit submission ambiguous, reconciling next tick");
            }
            Err(err) => {
                transitions.push(
                    self.machine
                        .exit_abandoned(&format!("exit rejected: {}", rejection_text(&err)))?,
                );
            }
        }
        Ok(())
    }

    async fn try_entry(
        &mut self,
        entry: &EntrySignal,
        status: &GateVerdict,
        verdict: &HealthVerdict,
        now: DateTime<Utc>,
        transitions: &mut Vec<TransitionOutcome>,
    ) -> EngineResult<Option<String>> {
        if self.kill_switch.engaged() {
            return Ok(Some("kill switch engaged".to_string()));
        }
        if !status.is_pass() {
            return Ok(Some(status.reason.clone()));
        }
        if verdict.is_degraded || self.degraded_since.is_some() {
            return Ok(Some(format!("stream degraded: {}", verdict.reason)));
        }
        if let Some(recovered_at) = self.degraded_recovered_at {
            if self.monitor.in_reentry_cooldown(recovered_at, now) {
                return Ok(Some("post-recovery entry cooldown".to_string()));
            }
        }
        if let Some(exited_at) = self.cooldown_exited_at {
            if now - exited_at < Duration::seconds(self.config.risk.reentry_cooldown_secs) {
                return Ok(Some("post-cooldown re-entry window".to_string()));
            }
        }
        if self.machine.state() != BotState::Flat {
            return Ok(Some(format!("not flat: {}", self.machine.state())));
        }

        let mut qty = entry.qty;
        match self.liq_gate.check(&entry.risk, &self.config.stage) {
            PreTradeDecision::Block(reason) => return Ok(Some(reason)),
            PreTradeDecision::Haircut { factor, reason } => {
                info!(factor = %factor, reason = %reason, "entry size haircut");
                qty = qty * factor;
            }
            PreTradeDecision::Pass => {}
        }

        let required_edge = self.config.min_edge_pct
            * self
                .fee_tightening
                .required_multiplier(&self.config.risk, now);
        if entry.expected_edge_pct < required_edge {
            return Ok(Some(format!(
                "edge {} below required {}",
                entry.expected_edge_pct, required_edge
            )));
        }

        let signal = SignalId::derive(&self.config.strategy, entry.bar_close, entry.side);
        self.planned_stop = Some(entry.stop_price);
        let mut pending =
            PendingOrder::new(signal.clone(), OrderRole::Entry, entry.side, qty, entry.limit_price);
        pending.submitted_at = now;
        transitions.push(self.machine.submit_entry(pending)?);

        match self
            .executor
            .place_entry(&signal, entry.side, qty, entry.limit_price)
            .await
        {
            Ok(PlaceOutcome::Submitted(ack)) => {
                self.machine.record_ack(ack.order_id);
            }
            Ok(PlaceOutcome::Reused(record)) => {
                if let Some(order_id) = record.order_id {
                    self.machine.record_ack(order_id);
                }
            }
            Err(err) if err.is_ambiguous() => {
                // The order may be live; stay pending and reconcile later.
                warn!(error = %err, "entry submission ambiguous");
            }
            Err(err) => {
                // Definitive rejection: unwind to flat.
                let role = OrderRole::Entry;
                let reference = OrderRef::new(&signal, role, self.config.exec.max_ref_len)?;
                let event = VenueEvent::Rejected {
                    order_id: None,
                    order_ref: Some(reference),
                    reason: rejection_text(&err),
                    timestamp: now,
                };
                if let Some(outcome) = self.machine.apply_event(&event)? {
                    transitions.push(outcome);
                }
                return Ok(Some(format!("entry rejected: {}", err)));
            }
        }

        Ok(None)
    }

    /// Emit one validated audit line per transition.
    fn audit(
        &self,
        transitions: &[TransitionOutcome],
        snapshot: &Snapshot,
    ) -> EngineResult<()> {
        for transition in transitions {
            let (position_qty, stop_status) = match self.machine.position() {
                Some(position) => (
                    Some(position.qty),
                    Some(position.stop_status.to_string()),
                ),
                None => (None, None),
            };
            let record = TransitionRecord::new(
                transition.reason.clone(),
                transition.to.to_string(),
                TransitionContext {
                    price: snapshot.market.price,
                    equity: snapshot.account.equity,
                    stage: self.config.stage.tier,
                    latency_ms: snapshot.health.rest_latency_p95_ms,
                    position_qty,
                    stop_status,
                },
            );
            info!(target: "audit", line = %record.to_json()?);
        }
        Ok(())
    }
}

fn rejection_text(err: &ExecError) -> String {
    match err {
        ExecError::Venue { code, message } => format!("{code} {message}"),
        other => other.to_string(),
    }
}
