//! Share filler.
//!
//! Leftover RAM after real work is handed to share workers. They earn
//! nothing directly, so they are launched last and are the first thing
//! killed when a real batch needs the room back.

use fleet::{HostControl, HostRegistry, WorkerKind, WorkerRam};
use tracing::debug;

use crate::ledger::RamLedger;

/// Fill remaining ledger headroom with share workers. Returns threads
/// launched.
pub async fn admit_share<H: HostControl>(
    host: &H,
    ledger: &mut RamLedger,
    registry: &HostRegistry,
    costs: &WorkerRam,
) -> u32 {
    let cost = costs.share;
    if cost <= 0.0 {
        return 0;
    }

    let mut launched = 0u32;
    for entry in ledger.entries_mut() {
        let threads = (entry.free_gb / cost).floor() as u32;
        if threads == 0 {
            continue;
        }
        let runner_name = registry.name(entry.host);
        let pid = host
            .exec(WorkerKind::Share.script(), runner_name, threads, &[])
            .await;
        if pid == 0 {
            continue;
        }
        entry.free_gb -= threads as f64 * cost;
        launched += threads;
    }

    if launched > 0 {
        debug!(threads = launched, "share filler admitted onto leftover RAM");
    }
    launched
}

/// Kill every share worker on the fleet to reclaim RAM for real work.
/// Returns the number of processes killed.
pub async fn reclaim_share<H: HostControl>(host: &H, runner_names: &[String]) -> u32 {
    let mut killed = 0u32;
    for runner in runner_names {
        for proc in host.ps(runner).await {
            if WorkerKind::from_script(&proc.filename) == Some(WorkerKind::Share)
                && host.kill(proc.pid, runner).await
            {
                killed += 1;
            }
        }
    }
    if killed > 0 {
        debug!(processes = killed, "share filler reclaimed for real work");
    }
    killed
}
