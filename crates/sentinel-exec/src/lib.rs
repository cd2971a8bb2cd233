//! Order execution against the venue.
//!
//! Everything that touches the venue API lives here: the dyn-compatible
//! `OrderVenue` trait (with a scriptable mock), the idempotent order
//! store, the executor that refuses to submit the same signal twice, and
//! the REST reconciler that resolves orders whose fate is unknown.

pub mod error;
pub mod executor;
pub mod reconcile;
pub mod store;
pub mod venue;

pub use error::{ExecError, ExecResult};
pub use executor::{ExecConfig, OrderExecutor, PlaceOutcome};
pub use reconcile::{ReconcileOutcome, Reconciler, StartupState};
pub use store::{InMemoryOrderStore, InsertOutcome, OrderRecord, OrderStore};
pub use venue::{
    AmendOutcome, BoxFuture, DynVenue, MockVenue, OrderAck, OrderRequest, OrderVenue,
    VenueExecution, VenueOrder, VenueOrderStatus, VenuePosition,
};
