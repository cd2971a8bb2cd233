//! The run loop.
//!
//! Pulls tick inputs from a `SnapshotSource` on a fixed interval and
//! feeds them to the orchestrator until shutdown is signalled. Tick
//! errors are logged and the loop continues; only a shutdown signal or a
//! source failure stops it.

use crate::error::EngineResult;
use crate::tick::{TickInputs, TickOrchestrator};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Supplies the inputs for each tick: market snapshot, drained stream
/// events and history slices.
pub trait SnapshotSource: Send + Sync {
    fn next_inputs(&self) -> BoxFuture<'_, EngineResult<TickInputs>>;
}

/// Run the decision loop until `shutdown` flips to true.
pub async fn run_loop(
    orchestrator: &mut TickOrchestrator,
    source: &dyn SnapshotSource,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> EngineResult<()> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let inputs = source.next_inputs().await?;
                match orchestrator.run_tick(inputs).await {
                    Ok(result) => {
                        info!(
                            state = %result.state,
                            transitions = result.transitions.len(),
                            "tick complete"
                        );
                    }
                    Err(err) => {
                        // One bad tick must not kill the agent; the next
                        // cycle re-evaluates from a fresh snapshot.
                        error!(error = %err, "tick failed");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("shutdown signal received, stopping loop");
                    return Ok(());
                }
            }
        }
    }
}
