//! Trading state machine.
//!
//! One machine per instrument. Owns the position and pending-order
//! records and enforces that every transition is one the lifecycle
//! allows; anything else returns a typed error instead of silently
//! corrupting state.

pub mod error;
pub mod events;
pub mod machine;

pub use error::{StateError, StateResult};
pub use events::VenueEvent;
pub use machine::{BotState, StateMachine, TransitionOutcome};
