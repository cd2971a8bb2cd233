//! Tick orchestration for the sentinel trading agent.
//!
//! Wires the safety gates, state machine and executor into the fixed
//! per-tick decision sequence, and hosts the ambient pieces: config
//! loading, logging init, the kill switch and the run loop.

pub mod config;
pub mod driver;
pub mod error;
pub mod killswitch;
pub mod logging;
pub mod tick;

pub use config::EngineConfig;
pub use driver::{run_loop, SnapshotSource};
pub use error::{EngineError, EngineResult};
pub use killswitch::KillSwitch;
pub use logging::init_logging;
pub use tick::{EntrySignal, TickInputs, TickOrchestrator, TickPhase, TickResult};
