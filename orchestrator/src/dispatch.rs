//! Batch dispatch.
//!
//! Places a batch's worker threads across the runner fleet, consuming
//! the RAM ledger in place. Launch order within a batch is weaken, then
//! grow, then hack; the planned delays (not the launch order) enforce
//! the landing order, so every launch in a batch must happen within the
//! same tick to share one `t = 0` baseline.

use fleet::{HostControl, HostRegistry, RunnerSnapshot, WorkerKind, WorkerRam};
use planner::{Batch, Tuning};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::ledger::RamLedger;

/// Per-kind tally of one batch's dispatch.
#[derive(Debug, Clone, Copy)]
pub struct KindOutcome {
    pub kind: WorkerKind,
    pub planned: u32,
    pub launched: u32,
}

/// What actually happened when a batch was dispatched.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub batch_id: Uuid,
    pub kinds: Vec<KindOutcome>,
    pub pids: Vec<u32>,
}

impl DispatchOutcome {
    /// True when every kind launched its full planned thread count.
    pub fn complete(&self) -> bool {
        self.kinds.iter().all(|k| k.launched == k.planned)
    }

    /// Kinds that fell short, for incident recording.
    pub fn shortfalls(&self) -> impl Iterator<Item = &KindOutcome> {
        self.kinds.iter().filter(|k| k.launched < k.planned)
    }

    pub fn launched_total(&self) -> u32 {
        self.kinds.iter().map(|k| k.launched).sum()
    }
}

/// Launch one batch against `target_name`.
///
/// Partial results are accepted: already-launched threads are never
/// retracted, and the caller decides what to record.
#[instrument(
    target = "dispatch",
    skip(host, ledger, registry, batch, costs, tuning),
    fields(target_host = %target_name, shape = %batch.shape())
)]
pub async fn dispatch_batch<H: HostControl>(
    host: &H,
    ledger: &mut RamLedger,
    registry: &HostRegistry,
    target_name: &str,
    batch: &Batch,
    costs: &WorkerRam,
    hack_chance: f64,
    tuning: &Tuning,
) -> DispatchOutcome {
    let batch_id = Uuid::new_v4();
    let mut kinds = Vec::new();
    let mut pids = Vec::new();
    let mut tag_seq = 0u32;

    let launches = batch.launches();
    for (i, launch) in launches.iter().enumerate() {
        let launched = dispatch_kind(
            host,
            ledger,
            registry,
            target_name,
            launch.kind,
            launch.threads,
            launch.delay_ms,
            costs,
            hack_chance,
            tuning,
            &mut tag_seq,
            &mut pids,
        )
        .await;

        kinds.push(KindOutcome {
            kind: launch.kind,
            planned: launch.threads,
            launched,
        });

        // Later kinds see accurate residuals even if an external actor
        // grabbed RAM between our exec calls.
        if i + 1 < launches.len() {
            refresh_ledger(host, ledger, registry).await;
        }
    }

    let outcome = DispatchOutcome {
        batch_id,
        kinds,
        pids,
    };
    if outcome.complete() {
        debug!(%batch_id, threads = outcome.launched_total(), "batch fully dispatched");
    } else {
        warn!(%batch_id, "batch partially dispatched");
    }
    outcome
}

/// Place `threads` workers of one kind, walking runners in allocation
/// order. Hack threads split into bounded chunks with unique tags when
/// success is unreliable, so each chunk rolls its own success check.
#[allow(clippy::too_many_arguments)]
async fn dispatch_kind<H: HostControl>(
    host: &H,
    ledger: &mut RamLedger,
    registry: &HostRegistry,
    target_name: &str,
    kind: WorkerKind,
    threads: u32,
    delay_ms: u64,
    costs: &WorkerRam,
    hack_chance: f64,
    tuning: &Tuning,
    tag_seq: &mut u32,
    pids: &mut Vec<u32>,
) -> u32 {
    let cost = costs.cost(kind);
    if cost <= 0.0 {
        return 0;
    }
    let split = kind == WorkerKind::Hack && hack_chance < tuning.reliable_hack_chance;

    let mut remaining = threads;
    for entry in ledger.entries_mut() {
        if remaining == 0 {
            break;
        }
        let fit = (entry.free_gb / cost).floor() as u32;
        let quota = fit.min(remaining);
        if quota == 0 {
            continue;
        }
        let runner_name = registry.name(entry.host);

        if split {
            let mut left = quota;
            while left > 0 {
                let chunk = left.min(tuning.hack_split_chunk);
                let args = vec![
                    target_name.to_string(),
                    delay_ms.to_string(),
                    tag_seq.to_string(),
                ];
                *tag_seq += 1;
                let pid = host.exec(kind.script(), runner_name, chunk, &args).await;
                if pid == 0 {
                    // RAM race on this runner; move on to the next one.
                    break;
                }
                pids.push(pid);
                entry.free_gb -= chunk as f64 * cost;
                remaining -= chunk;
                left -= chunk;
            }
        } else {
            let args = vec![target_name.to_string(), delay_ms.to_string()];
            let pid = host.exec(kind.script(), runner_name, quota, &args).await;
            if pid == 0 {
                continue;
            }
            pids.push(pid);
            entry.free_gb -= quota as f64 * cost;
            remaining -= quota;
        }
    }

    threads - remaining
}

/// Re-observe every ledger host and overwrite the free figures.
pub async fn refresh_ledger<H: HostControl>(
    host: &H,
    ledger: &mut RamLedger,
    registry: &HostRegistry,
) {
    let mut fresh = Vec::with_capacity(ledger.entries().len());
    for entry in ledger.entries() {
        let name = registry.name(entry.host);
        if let Some(info) = host.survey(name).await {
            fresh.push(RunnerSnapshot {
                host: entry.host,
                max_ram: info.max_ram,
                used_ram: info.used_ram,
                cores: info.cores,
            });
        }
    }
    ledger.refresh(&fresh);
}
