//! The tick engine.
//!
//! Responsibilities:
//! - Walk the network, root what it can, and split hosts into targets
//!   and runners (with worker scripts seeded onto new runners).
//! - Reconstruct in-flight state from the live process list.
//! - Advance every target's phase machine against fresh observations.
//! - Plan, downscale and dispatch batches under the fleet RAM budget.
//! - Fill leftover RAM with share workers and publish the tick snapshot.
//!
//! Safety/liveness properties:
//! - Nothing inside a tick is fatal; every error path returns to the
//!   tick boundary and the loop continues.
//! - Work per tick is bounded by the fresh-target budget; targets
//!   already in the loop are serviced first.
//! - Dispatched workers are never awaited, retracted or killed (share
//!   filler excepted).

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use fleet::types::scripts;
use fleet::{
    HackingModel, HostControl, HostId, HostRegistry, PlayerSnapshot, RunnerSnapshot, ServerInfo,
    TargetSnapshot, WorkerKind, WorkerRam,
};
use planner::{Batch, BatchKind, Planner, Shape, Tuning, downscale};
use targets::{Completion, LastBatchInfo, Phase, TargetMap};
use tracing::{debug, error, info, instrument, warn};

use crate::config::OrchestratorConfig;
use crate::counters::Counters;
use crate::dispatch::{dispatch_batch, refresh_ledger};
use crate::error::OrchestratorError;
use crate::incident::{Incident, IncidentLog};
use crate::ledger::RamLedger;
use crate::recovery::{self, FleetScan};
use crate::scoring::{check_target_eligibility, profit_score};
use crate::share;
use crate::snapshot::{self, SNAPSHOT_KEY, SnapshotStore};

/// A target the planner may act on this tick.
struct Plannable {
    id: HostId,
    snap: TargetSnapshot,
    score: f64,
    /// Never had a batch dispatched; counts against the fresh budget.
    fresh: bool,
}

pub struct Orchestrator<H: HostControl, M: HackingModel> {
    host: Arc<H>,
    model: M,
    cfg: OrchestratorConfig,
    tuning: Tuning,
    costs: WorkerRam,
    registry: HostRegistry,
    targets: TargetMap,
    incidents: IncidentLog,
    counters: Counters,
    snapshots: SnapshotStore,
    /// Runners already seeded with the worker script set.
    seeded: HashSet<HostId>,
}

impl<H: HostControl, M: HackingModel> Orchestrator<H, M> {
    /// Measure worker RAM costs and verify the home host exists.
    ///
    /// A zero cost for any batch worker means script introspection
    /// failed; planning with it would place unbounded thread counts.
    pub async fn init(
        host: Arc<H>,
        model: M,
        cfg: OrchestratorConfig,
    ) -> Result<Self, OrchestratorError> {
        let costs = WorkerRam {
            hack: host.script_ram(scripts::HACK).await,
            grow: host.script_ram(scripts::GROW).await,
            weaken: host.script_ram(scripts::WEAKEN).await,
            share: host.script_ram(scripts::SHARE).await,
        };
        if costs.hack <= 0.0 {
            return Err(OrchestratorError::UnknownScriptRam(scripts::HACK));
        }
        if costs.grow <= 0.0 {
            return Err(OrchestratorError::UnknownScriptRam(scripts::GROW));
        }
        if costs.weaken <= 0.0 {
            return Err(OrchestratorError::UnknownScriptRam(scripts::WEAKEN));
        }
        if host.survey(&cfg.home_host).await.is_none() {
            return Err(OrchestratorError::MissingHome(cfg.home_host.clone()));
        }

        info!(
            hack_ram = costs.hack,
            grow_ram = costs.grow,
            weaken_ram = costs.weaken,
            share_ram = costs.share,
            "worker RAM costs measured"
        );

        Ok(Self {
            host,
            model,
            cfg,
            tuning: Tuning::default(),
            costs,
            registry: HostRegistry::new(),
            targets: TargetMap::new(),
            incidents: IncidentLog::new(),
            counters: Counters::default(),
            snapshots: SnapshotStore::new(),
            seeded: HashSet::new(),
        })
    }

    pub fn snapshot_store(&self) -> SnapshotStore {
        self.snapshots.clone()
    }

    pub fn incident_log(&self) -> &IncidentLog {
        &self.incidents
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Phase of a target by hostname; test and TUI convenience.
    pub fn phase_of(&self, hostname: &str) -> Option<Phase> {
        let id = self.registry.get(hostname)?;
        self.targets.get(id).map(|s| s.phase)
    }

    /// Tick loop. Exits only on external kill; a failed tick is logged
    /// and the cadence continues.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!(tick_ms = self.cfg.tick_interval_ms, "orchestrator started");

        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.cfg.tick_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let now_ms = common::time::now_ms();
            if let Err(e) = self.tick(now_ms).await {
                error!(error = ?e, "tick failed; continuing");
            }
        }
    }

    /// One full pipeline pass. All computation inside is synchronous and
    /// deterministic given the observations taken at the top.
    #[instrument(target = "engine", skip(self))]
    pub async fn tick(&mut self, now_ms: u64) -> anyhow::Result<()> {
        Counters::bump(&self.counters.ticks);

        // 1. Discover.
        let world = self.observe_world().await;
        let player = self.host.player().await;

        // 2. Categorize.
        let (runners, runner_names) = self.categorize_runners(&world).await;
        if runners.is_empty() {
            self.incidents.record(Incident::NoRunner);
            Counters::bump(&self.counters.no_runner_ticks);
            return Ok(());
        }
        let mut ledger = RamLedger::build(&runners);

        let candidates = self.pick_candidates(&world, &player);

        // 3. Recover.
        let scan =
            recovery::scan_fleet(self.host.as_ref(), &runner_names, &mut self.registry).await;
        for (id, snap, _) in &candidates {
            let state = self.targets.entry(*id);
            recovery::recover_target(
                state,
                &scan.live(*id),
                snap,
                &self.model,
                &player,
                now_ms,
                &self.tuning,
            );
        }

        // 4. Completions and phase advancement.
        self.advance_targets(now_ms, &candidates);

        // 5-6. Plan, downscale, dispatch.
        self.plan_and_dispatch(now_ms, &player, &candidates, &scan, &mut ledger, &runner_names)
            .await;

        // 7. Fill leftover RAM.
        let shared = share::admit_share(
            self.host.as_ref(),
            &mut ledger,
            &self.registry,
            &self.costs,
        )
        .await;
        if shared > 0 {
            Counters::bump(&self.counters.share_launches);
        }

        // 8. Publish.
        let post_scan =
            recovery::scan_fleet(self.host.as_ref(), &runner_names, &mut self.registry).await;
        let snap =
            snapshot::build_snapshot(&post_scan, &self.targets, &ledger, common::time::wall_ms());
        self.snapshots.publish(snap.clone());
        let json = serde_json::to_string(&snap)?;
        self.host.write_data(SNAPSHOT_KEY, &json).await?;

        Ok(())
    }

    /// Breadth-first walk of the network from home, rooting whatever we
    /// can on the way. Returns a survey of every reachable host.
    async fn observe_world(&mut self) -> Vec<(HostId, ServerInfo)> {
        let mut queue = VecDeque::from([self.cfg.home_host.clone()]);
        let mut seen: HashSet<String> = queue.iter().cloned().collect();
        let mut out = Vec::new();

        while let Some(name) = queue.pop_front() {
            for neighbor in self.host.scan(&name).await {
                if seen.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }

            if !self.host.has_root(&name).await && !self.host.try_root(&name).await {
                debug!(host = %name, "no root yet; skipping until next tick");
            }

            if let Some(info) = self.host.survey(&name).await {
                let id = self.registry.intern(&name);
                out.push((id, info));
            }
        }
        out
    }

    /// Split the surveyed world into the runner pool and seed worker
    /// scripts onto runners that have not received them yet.
    async fn categorize_runners(
        &mut self,
        world: &[(HostId, ServerInfo)],
    ) -> (Vec<RunnerSnapshot>, Vec<String>) {
        let mut runners = Vec::new();
        let mut names = Vec::new();

        for (id, info) in world {
            if !info.rooted || info.max_ram <= 0.0 {
                continue;
            }
            let is_home = info.hostname == self.cfg.home_host;
            if is_home && self.cfg.ignore_home {
                continue;
            }

            if !is_home && !self.seeded.contains(id) {
                match self.host.scp(&scripts::ALL, &info.hostname).await {
                    Ok(()) => {
                        self.seeded.insert(*id);
                    }
                    Err(e) => {
                        warn!(host = %info.hostname, error = ?e, "worker seed failed; will retry");
                        continue;
                    }
                }
            }

            runners.push(RunnerSnapshot {
                host: *id,
                max_ram: info.max_ram,
                used_ram: info.used_ram,
                cores: info.cores,
            });
            names.push(info.hostname.clone());
        }

        (runners, names)
    }

    /// Eligible targets with their profit scores.
    fn pick_candidates(
        &self,
        world: &[(HostId, ServerInfo)],
        player: &PlayerSnapshot,
    ) -> Vec<(HostId, TargetSnapshot, f64)> {
        let mut out = Vec::new();
        for (id, info) in world {
            if !check_target_eligibility(info, player, &self.cfg).is_eligible() {
                continue;
            }
            let snap = TargetSnapshot::from_info(*id, info);
            let chance = self.model.hack_chance(&snap, player);
            let score = profit_score(snap.max_money, chance, snap.min_security);
            out.push((*id, snap, score));
        }
        out
    }

    /// Run every candidate's phase machine against the fresh snapshot,
    /// recording over-hacks as they surface.
    fn advance_targets(&mut self, now_ms: u64, candidates: &[(HostId, TargetSnapshot, f64)]) {
        for (id, snap, score) in candidates {
            let state = self.targets.entry(*id);
            state.profit_score = *score;

            let completion = state.advance(
                now_ms,
                snap.money,
                snap.max_money,
                snap.security,
                snap.min_security,
                &self.tuning,
            );

            if completion == Completion::OverHacked {
                Counters::bump(&self.counters.overhacks);
                let info = state.last_batch;
                let incident = Incident::OverHack {
                    target: self.registry.name(*id).to_string(),
                    money: snap.money,
                    pre_money: info.map_or(0.0, |i| i.pre_money),
                    hack_threads: info.map_or(0, |i| i.hack_threads),
                    weaken_threads: info.map_or(0, |i| i.weaken_threads),
                    margin_ms: info.map_or(0, |i| i.timing_margin_ms()),
                    backdoored: snap.backdoored,
                };
                self.incidents.record(incident);
            }
        }
    }

    /// Admission, planning, downscaling and dispatch for one tick.
    ///
    /// Targets already in the loop are serviced first and do not count
    /// against the fresh budget; fresh targets are taken best-score
    /// first until the budget runs out.
    async fn plan_and_dispatch(
        &mut self,
        now_ms: u64,
        player: &PlayerSnapshot,
        candidates: &[(HostId, TargetSnapshot, f64)],
        scan: &FleetScan,
        ledger: &mut RamLedger,
        runner_names: &[String],
    ) {
        let mut plannable = Vec::new();
        for (id, snap, score) in candidates {
            let state = self.targets.entry(*id);
            if state.is_busy(now_ms, &self.tuning) {
                continue;
            }

            let live = scan.live(*id);
            if live.any() {
                // The tracker says idle but workers are still aimed at
                // this target: external actor or straggler threads.
                Counters::bump(&self.counters.overlaps);
                let incident = Incident::Overlap {
                    target: self.registry.name(*id).to_string(),
                    hack: live.hack,
                    grow: live.grow,
                    weaken: live.weaken,
                };
                self.incidents.record(incident);
                continue;
            }

            if !matches!(state.phase, Phase::Ready | Phase::Unprepped) {
                continue;
            }
            plannable.push(Plannable {
                id: *id,
                snap: *snap,
                score: *score,
                fresh: !state.ever_dispatched,
            });
        }

        plannable.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut fresh_budget = self.cfg.max_fresh_targets;
        let mut reclaimed = false;

        // In-loop targets first, then fresh ones under the budget.
        let (followups, fresh): (Vec<_>, Vec<_>) =
            plannable.into_iter().partition(|p| !p.fresh);

        for cand in followups.into_iter().chain(fresh) {
            if cand.fresh && fresh_budget == 0 {
                continue;
            }
            let dispatched = self
                .plan_one(now_ms, player, &cand, scan, ledger, runner_names, &mut reclaimed)
                .await;
            if dispatched && cand.fresh {
                fresh_budget -= 1;
            }
        }
    }

    /// Plan and dispatch a single target. Returns whether a batch went
    /// out.
    #[allow(clippy::too_many_arguments)]
    async fn plan_one(
        &mut self,
        now_ms: u64,
        player: &PlayerSnapshot,
        cand: &Plannable,
        scan: &FleetScan,
        ledger: &mut RamLedger,
        runner_names: &[String],
        reclaimed: &mut bool,
    ) -> bool {
        let planner = Planner::new(
            &self.model,
            &self.tuning,
            &self.costs,
            self.cfg.closed_form_grow,
        );
        let snap = &cand.snap;

        let phase = match self.targets.get(cand.id) {
            Some(s) => s.phase,
            None => return false,
        };
        // Idle phases share one selection path: `preferred` yields the
        // prep wave for hot targets (unless they are drained below the
        // floor, where income comes first) and an income shape otherwise.
        let Some(mut batch) = (match phase {
            Phase::Unprepped | Phase::Ready => planner.preferred(snap, player),
            _ => None,
        }) else {
            return false;
        };

        if batch.threads(WorkerKind::Grow) > self.tuning.large_grow_threads {
            let incident = Incident::LargeGrow {
                target: self.registry.name(cand.id).to_string(),
                grow_threads: batch.threads(WorkerKind::Grow),
            };
            self.incidents.record(incident);
        }

        // Downscale against whatever the fleet still has this tick.
        let mut fitted = downscale(
            &batch,
            ledger.total_free(),
            &self.costs,
            &self.tuning,
            snap.excess_security(),
        );

        // A combined shape that cannot be funded falls back to its split
        // half before giving up.
        if fitted.is_none() && batch.shape() == Shape::Ghw {
            if let Some(split) = planner.fallback(snap, player) {
                batch = split;
                fitted = downscale(
                    &batch,
                    ledger.total_free(),
                    &self.costs,
                    &self.tuning,
                    snap.excess_security(),
                );
            }
        }

        // Last resort: evict share filler and retry once.
        if fitted.is_none() && scan.share_threads > 0 && !*reclaimed {
            *reclaimed = true;
            let killed = share::reclaim_share(self.host.as_ref(), runner_names).await;
            if killed > 0 {
                Counters::bump(&self.counters.share_reclaims);
                refresh_ledger(self.host.as_ref(), ledger, &self.registry).await;
                fitted = downscale(
                    &batch,
                    ledger.total_free(),
                    &self.costs,
                    &self.tuning,
                    snap.excess_security(),
                );
            }
        }

        let Some(final_batch) = fitted else {
            Counters::bump(&self.counters.dropped_plans);
            debug!(
                target_host = %self.registry.name(cand.id),
                needed_gb = batch.ram_gb,
                free_gb = ledger.total_free(),
                "no viable downscale; target skipped this tick"
            );
            return false;
        };
        if final_batch.total_threads() < batch.total_threads() {
            Counters::bump(&self.counters.downscaled_batches);
        }

        let hack_chance = self.model.hack_chance(snap, player);
        let outcome = dispatch_batch(
            self.host.as_ref(),
            ledger,
            &self.registry,
            self.registry.name(cand.id),
            &final_batch,
            &self.costs,
            hack_chance,
            &self.tuning,
        )
        .await;

        for short in outcome.shortfalls() {
            Counters::bump(&self.counters.partial_dispatches);
            let incident = Incident::PartialDispatch {
                target: self.registry.name(cand.id).to_string(),
                batch_id: outcome.batch_id,
                kind: short.kind,
                planned: short.planned,
                launched: short.launched,
            };
            self.incidents.record(incident);
        }

        if outcome.launched_total() == 0 {
            return false;
        }

        // Phase and end time reflect what actually went out; partial
        // batches are never retracted.
        let info = last_batch_info(&final_batch, snap, now_ms);
        if let Some(state) = self.targets.get_mut(cand.id) {
            state.on_dispatch(&final_batch, now_ms, info);
        }

        Counters::bump(&self.counters.batches_dispatched);
        if final_batch.shape() == Shape::PrepWeaken {
            Counters::bump(&self.counters.prep_batches);
        }
        info!(
            target_host = %self.registry.name(cand.id),
            shape = %final_batch.shape(),
            threads = outcome.launched_total(),
            ram_gb = final_batch.ram_gb,
            batch_id = %outcome.batch_id,
            "batch dispatched"
        );
        true
    }
}

/// Diagnostics snapshot retained with the target across one completion.
fn last_batch_info(batch: &Batch, snap: &TargetSnapshot, now_ms: u64) -> LastBatchInfo {
    let (hack_delay_ms, hack_time_ms) = match batch.kind {
        BatchKind::Hw(p) => (p.hack_delay_ms, p.hack_time_ms),
        BatchKind::Ghw(p) => (p.hack_delay_ms, p.hack_time_ms),
        _ => (0, 0),
    };
    LastBatchInfo {
        shape: batch.shape(),
        hack_threads: batch.threads(WorkerKind::Hack),
        grow_threads: batch.threads(WorkerKind::Grow),
        weaken_threads: batch.threads(WorkerKind::Weaken),
        pre_money: snap.money,
        pre_security: snap.security,
        hack_delay_ms,
        hack_time_ms,
        weaken_time_ms: batch.duration_ms,
        backdoored: snap.backdoored,
        dispatched_at_ms: now_ms,
    }
}
