//! Per-target state.
//!
//! The orchestrator exclusively owns and mutates everything in this
//! crate; worker processes never touch it. State is reconstructed from
//! the live process list after a restart, so nothing here persists.

pub mod map;
pub mod phase;
pub mod state;

pub use map::TargetMap;
pub use phase::Phase;
pub use state::{Completion, LastBatchInfo, TargetState};
