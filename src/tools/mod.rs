//! Host tool surface.
//!
//! Tools are the bridge's interface to the ship. The [`Host`] trait is the
//! seam; [`SimulatedHost`] is an in-memory implementation with a call
//! journal, used by the REPL and tests.

mod host;
mod simulated;

pub use host::{
    Host, HostOp, MiningStart, MiningState, MiningStatus, OpResult, Resource, Resources,
    ScanFilter, ScanHit, ScriptRecord, ScriptSummary, ShipStatus, Vec3,
};
pub use simulated::{Failure, HostCall, SimulatedHost};
