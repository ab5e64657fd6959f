//! Snapshot publishing.
//!
//! One structured view per tick for peer services (hash spender, server
//! purchaser, status TUIs). Thread counts are derived from the live
//! process list, never from plans. Consumers treat the artifact as stale
//! after two minutes.

use std::sync::Arc;

use fleet::HostId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use targets::TargetMap;

use crate::ledger::RamLedger;
use crate::recovery::FleetScan;

/// Well-known artifact key peers read.
pub const SNAPSHOT_KEY: &str = "/data/orchestrator-info.json";

/// Age beyond which consumers must treat a snapshot as absent.
pub const SNAPSHOT_STALE_MS: i64 = 120_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetSnapshot {
    /// Wall-clock milliseconds; peers use this for staleness only.
    pub timestamp: i64,

    pub share_threads: u32,
    pub total_threads: u32,
    pub hacking_threads: u32,
    pub prep_threads: u32,
    pub cycle_threads: u32,

    /// Share filler and real work coexist: the fleet has no unused RAM.
    pub saturated: bool,

    pub prepped_servers: u32,
    pub prepping_servers: u32,
    pub cycling_servers: u32,

    pub free_ram_gb: f64,
}

impl FleetSnapshot {
    pub fn is_fresh(&self, now_wall_ms: i64) -> bool {
        now_wall_ms - self.timestamp <= SNAPSHOT_STALE_MS
    }
}

/// Build the per-tick snapshot from a post-dispatch fleet scan.
pub fn build_snapshot(
    scan: &FleetScan,
    targets: &TargetMap,
    ledger: &RamLedger,
    timestamp: i64,
) -> FleetSnapshot {
    let mut prep_threads = 0u32;
    let mut cycle_threads = 0u32;

    for (host, live) in &scan.per_target {
        if is_prep_target(targets, *host) {
            prep_threads += live.total();
        } else {
            cycle_threads += live.total();
        }
    }

    let worker_threads = scan.worker_threads();
    let saturated = scan.share_threads > 0 && worker_threads > 0;

    FleetSnapshot {
        timestamp,
        share_threads: scan.share_threads,
        total_threads: worker_threads + scan.share_threads,
        hacking_threads: scan.hack_threads(),
        prep_threads,
        cycle_threads,
        saturated,
        prepped_servers: targets.count_in_phase(targets::Phase::Ready) as u32,
        prepping_servers: (targets.count_in_phase(targets::Phase::Prepping)
            + targets.count_in_phase(targets::Phase::Unprepped)) as u32,
        cycling_servers: targets.count_cycling() as u32,
        free_ram_gb: ledger.total_free(),
    }
}

fn is_prep_target(targets: &TargetMap, host: HostId) -> bool {
    targets.get(host).is_none_or(|s| s.phase.is_prep())
}

/// Shared read-only view for in-process peers. The artifact written via
/// the host-control interface is the cross-process equivalent.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Option<FleetSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, snapshot: FleetSnapshot) {
        *self.inner.write() = Some(snapshot);
    }

    pub fn latest(&self) -> Option<FleetSnapshot> {
        self.inner.read().clone()
    }

    /// The latest snapshot, unless it has gone stale.
    pub fn fresh(&self, now_wall_ms: i64) -> Option<FleetSnapshot> {
        self.latest().filter(|s| s.is_fresh(now_wall_ms))
    }
}
