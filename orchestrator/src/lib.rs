//! Fleet batch orchestrator.
//!
//! One cooperative scheduler advancing once per tick:
//! discover → categorize → recover → plan → downscale → dispatch →
//! fill → publish. Nothing inside the loop is fatal; every error path
//! returns to the tick boundary.

pub mod config;
pub mod counters;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod incident;
pub mod ledger;
pub mod recovery;
pub mod scoring;
pub mod share;
pub mod snapshot;

pub use config::OrchestratorConfig;
pub use engine::Orchestrator;
pub use error::OrchestratorError;
pub use incident::{Incident, IncidentLog};
pub use snapshot::{FleetSnapshot, SnapshotStore, SNAPSHOT_KEY};
