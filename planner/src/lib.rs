//! Batch planning.
//!
//! Pure arithmetic over world snapshots: no I/O, no clocks, no state.
//! Given the same observed target, the planner always emits the same
//! batch. The orchestrator owns dispatch and RAM accounting; this crate
//! only decides thread counts, delays and shapes.

pub mod batch;
pub mod downscale;
pub mod plan;
pub mod threads;
pub mod tuning;

pub use batch::{Batch, BatchKind, GhwPlan, GwPlan, HwPlan, Launch, PrepWeakenPlan, Shape};
pub use downscale::downscale;
pub use plan::Planner;
pub use tuning::Tuning;
