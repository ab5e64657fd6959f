//! World model for the batch orchestrator.
//!
//! This crate owns everything the scheduler observes but does not control:
//! host identity, server/runner/player snapshots, the worker-script
//! catalog, the hacking-model and host-control interfaces, and an
//! in-memory simulation backend used by the binary and the tests.

pub mod control;
pub mod model;
pub mod registry;
pub mod sim;
pub mod types;

pub use control::HostControl;
pub use model::{FormulaModel, HackingModel};
pub use registry::{HostId, HostRegistry};
pub use types::{
    PlayerSnapshot, ProcessInfo, RunnerSnapshot, ServerInfo, TargetSnapshot, WorkerKind, WorkerRam,
};
