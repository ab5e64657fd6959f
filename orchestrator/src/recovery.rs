//! Recovery and drift correction.
//!
//! The live process list is the authority on what is actually running.
//! Each tick it is folded into per-target thread buckets; targets the
//! tracker believes idle but that have live workers get a phase inferred
//! and a conservative completion estimate. Applying the same scan twice
//! is a no-op the second time.

use std::collections::HashMap;

use fleet::{HackingModel, HostControl, HostId, HostRegistry, PlayerSnapshot, TargetSnapshot,
            WorkerKind};
use planner::Tuning;
use targets::{Phase, TargetState};
use tracing::{debug, info};

/// Live worker threads aimed at one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveThreads {
    pub hack: u32,
    pub grow: u32,
    pub weaken: u32,
}

impl LiveThreads {
    pub fn total(&self) -> u32 {
        self.hack + self.grow + self.weaken
    }

    pub fn any(&self) -> bool {
        self.total() > 0
    }
}

/// One pass over every runner's process table.
#[derive(Debug, Default)]
pub struct FleetScan {
    pub per_target: HashMap<HostId, LiveThreads>,
    pub share_threads: u32,
}

impl FleetScan {
    pub fn live(&self, target: HostId) -> LiveThreads {
        self.per_target.get(&target).copied().unwrap_or_default()
    }

    pub fn worker_threads(&self) -> u32 {
        self.per_target.values().map(LiveThreads::total).sum()
    }

    pub fn hack_threads(&self) -> u32 {
        self.per_target.values().map(|l| l.hack).sum()
    }
}

/// Sum live worker threads per target across `runners`.
///
/// Targets named by workers we did not launch are interned on the fly;
/// external actors are part of the observed world too.
pub async fn scan_fleet<H: HostControl>(
    host: &H,
    runner_names: &[String],
    registry: &mut HostRegistry,
) -> FleetScan {
    let mut scan = FleetScan::default();

    for runner in runner_names {
        for proc in host.ps(runner).await {
            let Some(kind) = WorkerKind::from_script(&proc.filename) else {
                continue;
            };
            if kind == WorkerKind::Share {
                scan.share_threads += proc.threads;
                continue;
            }
            let Some(target_name) = proc.args.first() else {
                continue;
            };
            let id = registry.intern(target_name);
            let bucket = scan.per_target.entry(id).or_default();
            match kind {
                WorkerKind::Hack => bucket.hack += proc.threads,
                WorkerKind::Grow => bucket.grow += proc.threads,
                WorkerKind::Weaken => bucket.weaken += proc.threads,
                WorkerKind::Share => unreachable!(),
            }
        }
    }

    debug!(
        targets = scan.per_target.len(),
        worker_threads = scan.worker_threads(),
        share_threads = scan.share_threads,
        "fleet scan complete"
    );
    scan
}

/// Classify live threads into the phase they most plausibly belong to.
///
/// Only unambiguous mixes reclassify: hack implies an income batch,
/// grow-only implies the grow half, and a lone weaken wave is read from
/// the target's money and security levels.
pub fn infer_phase(live: &LiveThreads, target: &TargetSnapshot, tuning: &Tuning) -> Phase {
    if live.hack > 0 && live.grow > 0 {
        return Phase::GhwInflight;
    }
    if live.hack > 0 {
        return Phase::HwInflight;
    }
    if live.grow > 0 {
        return Phase::GwInflight;
    }
    // Weaken only. Near-minimum security means the batch's main act has
    // already landed; the money level says which act it was.
    if target.security <= target.min_security + tuning.prep_epsilon {
        if target.money < 0.5 * target.max_money {
            Phase::WeakenAfterHack
        } else {
            Phase::WeakenAfterGrow
        }
    } else {
        Phase::Prepping
    }
}

/// Adopt an inferred phase for a target the tracker believes idle.
///
/// The completion estimate is deliberately conservative: a full weaken
/// run from now. The next real completion re-synchronizes.
pub fn recover_target<M: HackingModel>(
    state: &mut TargetState,
    live: &LiveThreads,
    target: &TargetSnapshot,
    model: &M,
    player: &PlayerSnapshot,
    now_ms: u64,
    tuning: &Tuning,
) {
    if state.batch_end_ms != 0 || !live.any() {
        return;
    }

    let phase = infer_phase(live, target, tuning);
    let end_ms = now_ms + model.weaken_time_ms(target, player);
    state.adopt_recovered(phase, end_ms, live.total());

    info!(
        target_host = %target.host,
        phase = %phase,
        hack = live.hack,
        grow = live.grow,
        weaken = live.weaken,
        end_ms,
        "recovered in-flight state from live workers"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet::HostRegistry;

    struct FixedModel;

    impl HackingModel for FixedModel {
        fn hack_time_ms(&self, _: &TargetSnapshot, _: &PlayerSnapshot) -> u64 {
            1_000
        }
        fn grow_time_ms(&self, _: &TargetSnapshot, _: &PlayerSnapshot) -> u64 {
            2_000
        }
        fn weaken_time_ms(&self, _: &TargetSnapshot, _: &PlayerSnapshot) -> u64 {
            2_500
        }
        fn hack_percent(&self, _: &TargetSnapshot, _: &PlayerSnapshot) -> f64 {
            0.01
        }
        fn hack_chance(&self, _: &TargetSnapshot, _: &PlayerSnapshot) -> f64 {
            1.0
        }
        fn grow_percent(&self, _: &TargetSnapshot, t: u32, _: &PlayerSnapshot, _: u32) -> f64 {
            1.2f64.powi(t as i32)
        }
    }

    fn mk_target(money: f64, security: f64) -> TargetSnapshot {
        TargetSnapshot {
            host: HostRegistry::new().intern("victim"),
            max_money: 1.0e6,
            money,
            security,
            min_security: 5.0,
            growth: 30.0,
            required_level: 100,
            backdoored: false,
        }
    }

    fn live(hack: u32, grow: u32, weaken: u32) -> LiveThreads {
        LiveThreads { hack, grow, weaken }
    }

    #[test]
    fn hack_and_grow_mean_combined_batch() {
        let tuning = Tuning::default();
        let t = mk_target(5.0e5, 6.0);
        assert_eq!(infer_phase(&live(10, 10, 2), &t, &tuning), Phase::GhwInflight);
        assert_eq!(infer_phase(&live(10, 0, 2), &t, &tuning), Phase::HwInflight);
        assert_eq!(infer_phase(&live(0, 10, 2), &t, &tuning), Phase::GwInflight);
    }

    #[test]
    fn lone_weaken_reads_money_and_security() {
        let tuning = Tuning::default();

        // Elevated security: a prep wave.
        let hot = mk_target(5.0e5, 15.0);
        assert_eq!(infer_phase(&live(0, 0, 8), &hot, &tuning), Phase::Prepping);

        // Near-minimum, drained: the weaken after a hack.
        let drained = mk_target(5.0e4, 5.2);
        assert_eq!(
            infer_phase(&live(0, 0, 8), &drained, &tuning),
            Phase::WeakenAfterHack
        );

        // Near-minimum, full: the weaken after a grow.
        let full = mk_target(9.5e5, 5.2);
        assert_eq!(
            infer_phase(&live(0, 0, 8), &full, &tuning),
            Phase::WeakenAfterGrow
        );
    }

    #[test]
    fn recovery_sets_conservative_end_time() {
        let tuning = Tuning::default();
        let t = mk_target(5.0e4, 5.2);
        let mut state = TargetState::new();

        recover_target(
            &mut state,
            &live(0, 10, 2),
            &t,
            &FixedModel,
            &PlayerSnapshot { hacking: 500 },
            10_000,
            &tuning,
        );

        assert_eq!(state.phase, Phase::GwInflight);
        assert_eq!(state.batch_end_ms, 12_500);
        assert_eq!(state.batch_threads_total, 12);
    }

    #[test]
    fn recovery_is_idempotent() {
        let tuning = Tuning::default();
        let t = mk_target(5.0e4, 5.2);
        let player = PlayerSnapshot { hacking: 500 };
        let mut state = TargetState::new();

        recover_target(&mut state, &live(0, 10, 2), &t, &FixedModel, &player, 10_000, &tuning);
        let first = state.clone();

        // Same scan again, even at a later time: the adopted state stands.
        recover_target(&mut state, &live(0, 10, 2), &t, &FixedModel, &player, 11_000, &tuning);
        assert_eq!(state.phase, first.phase);
        assert_eq!(state.batch_end_ms, first.batch_end_ms);
        assert_eq!(state.batch_threads_total, first.batch_threads_total);
    }

    #[test]
    fn tracked_targets_are_left_alone() {
        let tuning = Tuning::default();
        let t = mk_target(5.0e4, 5.2);
        let mut state = TargetState::new();
        state.adopt_recovered(Phase::HwInflight, 99_000, 50);

        recover_target(
            &mut state,
            &live(0, 10, 2),
            &t,
            &FixedModel,
            &PlayerSnapshot { hacking: 500 },
            10_000,
            &tuning,
        );
        assert_eq!(state.phase, Phase::HwInflight);
        assert_eq!(state.batch_end_ms, 99_000);
    }
}
