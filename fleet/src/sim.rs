//! In-memory world simulation.
//!
//! Implements `HostControl` over a deterministic host table with a
//! virtual clock: launched workers become pending effects that land when
//! the clock passes their end time, using the same `FormulaModel` the
//! planner consults. Drives the binary's soak mode and the end-to-end
//! tests.
//!
//! Determinism: hack workers always succeed in the sim. `hack_chance`
//! still shapes planning (thread inflation, splitting), but no RNG is
//! rolled at landing time.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::trace;

use crate::model::{FormulaModel, HackingModel, SEC_PER_GROW, SEC_PER_HACK};
use crate::types::{PlayerSnapshot, ProcessInfo, ServerInfo, TargetSnapshot, WorkerKind, scripts};

/// Fixed lifetime of a share worker.
const SHARE_RUNTIME_MS: u64 = 10_000;

/// Host definition used to seed the world.
#[derive(Debug, Clone)]
pub struct SimHost {
    pub hostname: String,
    pub neighbors: Vec<String>,
    pub rooted: bool,
    /// Whether `try_root` succeeds on this host.
    pub rootable: bool,
    pub max_ram: f64,
    pub cores: u32,
    pub max_money: f64,
    pub money: f64,
    pub security: f64,
    pub min_security: f64,
    pub growth: f64,
    pub required_level: u32,
    pub backdoored: bool,
    pub files: Vec<String>,
}

impl Default for SimHost {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            neighbors: Vec::new(),
            rooted: false,
            rootable: true,
            max_ram: 0.0,
            cores: 1,
            max_money: 0.0,
            money: 0.0,
            security: 1.0,
            min_security: 1.0,
            growth: 1.0,
            required_level: 1,
            backdoored: false,
            files: Vec::new(),
        }
    }
}

impl SimHost {
    /// The orchestrator's own host: rooted, all workers on disk.
    pub fn home(max_ram: f64, cores: u32) -> Self {
        Self {
            hostname: "home".into(),
            rooted: true,
            rootable: true,
            max_ram,
            cores,
            files: scripts::ALL.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone)]
struct SimProc {
    pid: u32,
    script: String,
    threads: u32,
    args: Vec<String>,
    ends_ms: u64,
    /// Cores of the host running the process; fixed at launch.
    cores: u32,
}

struct WorldInner {
    clock_ms: u64,
    player: PlayerSnapshot,
    hosts: HashMap<String, SimHost>,
    procs: HashMap<String, Vec<SimProc>>,
    next_pid: u32,
    artifacts: HashMap<String, String>,
}

/// Deterministic in-memory `HostControl` backend.
pub struct SimWorld {
    inner: Mutex<WorldInner>,
    model: FormulaModel,
    realtime: bool,
}

impl SimWorld {
    /// Manual-clock world; tests call `advance_to` explicitly.
    pub fn new(player: PlayerSnapshot) -> Self {
        Self {
            inner: Mutex::new(WorldInner {
                clock_ms: 0,
                player,
                hosts: HashMap::new(),
                procs: HashMap::new(),
                next_pid: 1,
                artifacts: HashMap::new(),
            }),
            model: FormulaModel,
            realtime: false,
        }
    }

    /// World whose clock follows `common::time::now_ms` on every call.
    pub fn new_realtime(player: PlayerSnapshot) -> Self {
        let mut world = Self::new(player);
        world.realtime = true;
        {
            let mut inner = world.inner.lock();
            inner.clock_ms = common::time::now_ms();
        }
        world
    }

    pub fn add_host(&self, host: SimHost) {
        let mut inner = self.inner.lock();
        inner.procs.entry(host.hostname.clone()).or_default();
        inner.hosts.insert(host.hostname.clone(), host);
    }

    /// Advance the virtual clock, landing every worker whose end time has
    /// passed, in end-time order.
    pub fn advance_to(&self, ms: u64) {
        let mut inner = self.inner.lock();
        self.advance_inner(&mut inner, ms);
    }

    pub fn clock_ms(&self) -> u64 {
        let mut inner = self.inner.lock();
        self.sync(&mut inner);
        inner.clock_ms
    }

    pub fn money_of(&self, host: &str) -> f64 {
        self.inner.lock().hosts.get(host).map_or(0.0, |h| h.money)
    }

    pub fn security_of(&self, host: &str) -> f64 {
        self.inner.lock().hosts.get(host).map_or(0.0, |h| h.security)
    }

    /// Last artifact written under `key`, if any.
    pub fn read_artifact(&self, key: &str) -> Option<String> {
        self.inner.lock().artifacts.get(key).cloned()
    }

    /// Synchronous process listing for assertions.
    pub fn processes_on(&self, host: &str) -> Vec<ProcessInfo> {
        let inner = self.inner.lock();
        inner
            .procs
            .get(host)
            .map(|ps| ps.iter().map(proc_info).collect())
            .unwrap_or_default()
    }

    fn sync(&self, inner: &mut WorldInner) {
        if self.realtime {
            let now = common::time::now_ms();
            self.advance_inner(inner, now);
        }
    }

    fn advance_inner(&self, inner: &mut WorldInner, ms: u64) {
        if ms <= inner.clock_ms {
            return;
        }

        // Land due workers strictly ordered by (end time, pid) so that
        // staggered batches apply their effects in landing order.
        loop {
            let mut due: Option<(String, usize)> = None;
            let mut best = (u64::MAX, u32::MAX);
            for (host, procs) in &inner.procs {
                for (i, p) in procs.iter().enumerate() {
                    if p.ends_ms <= ms && (p.ends_ms, p.pid) < best {
                        best = (p.ends_ms, p.pid);
                        due = Some((host.clone(), i));
                    }
                }
            }
            let Some((host, idx)) = due else { break };
            let Some(procs) = inner.procs.get_mut(&host) else {
                break;
            };
            let proc = procs.remove(idx);
            self.land(inner, &proc);
        }

        inner.clock_ms = ms;
    }

    fn land(&self, inner: &mut WorldInner, proc: &SimProc) {
        let Some(kind) = WorkerKind::from_script(&proc.script) else {
            return;
        };
        if kind == WorkerKind::Share {
            return;
        }
        let Some(target_name) = proc.args.first().cloned() else {
            return;
        };
        let player = inner.player;
        let Some(target) = inner.hosts.get_mut(&target_name) else {
            return;
        };

        trace!(
            pid = proc.pid,
            script = %proc.script,
            threads = proc.threads,
            target_host = %target_name,
            at_ms = proc.ends_ms,
            "worker landed"
        );

        let snapshot = snapshot_of(target);
        let threads = proc.threads as f64;
        match kind {
            WorkerKind::Weaken => {
                let drop = self.model.weaken_per_thread(proc.cores) * threads;
                target.security = (target.security - drop).max(target.min_security);
            }
            WorkerKind::Grow => {
                let factor = self
                    .model
                    .grow_percent(&snapshot, proc.threads, &player, proc.cores);
                target.money = ((target.money + threads) * factor).min(target.max_money);
                target.security = (target.security + SEC_PER_GROW * threads).min(100.0);
            }
            WorkerKind::Hack => {
                let per_thread = self.model.hack_percent(&snapshot, &player);
                let stolen = (per_thread * threads * target.money).min(target.money);
                target.money -= stolen;
                target.security = (target.security + SEC_PER_HACK * threads).min(100.0);
            }
            WorkerKind::Share => unreachable!(),
        }
    }

    fn used_ram(inner: &WorldInner, host: &str) -> f64 {
        inner
            .procs
            .get(host)
            .map(|ps| {
                ps.iter()
                    .map(|p| static_script_ram(&p.script) * p.threads as f64)
                    .sum()
            })
            .unwrap_or(0.0)
    }

    /// Worker runtime at launch: delay plus the model time for the kind,
    /// measured at the target's current security.
    fn runtime_ms(&self, inner: &WorldInner, kind: WorkerKind, target_name: &str) -> Option<u64> {
        if kind == WorkerKind::Share {
            return Some(SHARE_RUNTIME_MS);
        }
        let target = inner.hosts.get(target_name)?;
        let snapshot = snapshot_of(target);
        let player = inner.player;
        Some(match kind {
            WorkerKind::Hack => self.model.hack_time_ms(&snapshot, &player),
            WorkerKind::Grow => self.model.grow_time_ms(&snapshot, &player),
            WorkerKind::Weaken => self.model.weaken_time_ms(&snapshot, &player),
            WorkerKind::Share => unreachable!(),
        })
    }
}

fn snapshot_of(host: &SimHost) -> TargetSnapshot {
    // The sim keys everything by hostname; the registry id is irrelevant
    // inside the world, so a placeholder id is fine here.
    TargetSnapshot {
        host: crate::registry::HostRegistry::new().intern(&host.hostname),
        max_money: host.max_money,
        money: host.money,
        security: host.security,
        min_security: host.min_security,
        growth: host.growth,
        required_level: host.required_level,
        backdoored: host.backdoored,
    }
}

fn proc_info(p: &SimProc) -> ProcessInfo {
    ProcessInfo {
        filename: p.script.clone(),
        pid: p.pid,
        threads: p.threads,
        args: p.args.clone(),
    }
}

fn static_script_ram(script: &str) -> f64 {
    match script {
        scripts::HACK => 1.70,
        scripts::GROW => 1.75,
        scripts::WEAKEN => 1.75,
        scripts::SHARE => 4.00,
        _ => 0.0,
    }
}

#[async_trait]
impl crate::control::HostControl for SimWorld {
    async fn scan(&self, host: &str) -> Vec<String> {
        let mut inner = self.inner.lock();
        self.sync(&mut inner);
        inner
            .hosts
            .get(host)
            .map(|h| h.neighbors.clone())
            .unwrap_or_default()
    }

    async fn try_root(&self, host: &str) -> bool {
        let mut inner = self.inner.lock();
        self.sync(&mut inner);
        match inner.hosts.get_mut(host) {
            Some(h) => {
                if h.rootable {
                    h.rooted = true;
                }
                h.rooted
            }
            None => false,
        }
    }

    async fn has_root(&self, host: &str) -> bool {
        self.inner.lock().hosts.get(host).is_some_and(|h| h.rooted)
    }

    async fn scp(&self, files: &[&str], dest: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock();
        let host = inner
            .hosts
            .get_mut(dest)
            .ok_or_else(|| anyhow::anyhow!("scp: no such host: {dest}"))?;
        for f in files {
            if !host.files.iter().any(|existing| existing == f) {
                host.files.push(f.to_string());
            }
        }
        Ok(())
    }

    async fn ps(&self, host: &str) -> Vec<ProcessInfo> {
        let mut inner = self.inner.lock();
        self.sync(&mut inner);
        inner
            .procs
            .get(host)
            .map(|ps| ps.iter().map(proc_info).collect())
            .unwrap_or_default()
    }

    async fn exec(&self, script: &str, host: &str, threads: u32, args: &[String]) -> u32 {
        let mut inner = self.inner.lock();
        self.sync(&mut inner);

        if threads == 0 {
            return 0;
        }
        let Some(h) = inner.hosts.get(host) else {
            return 0;
        };
        if !h.rooted || !h.files.iter().any(|f| f == script) {
            return 0;
        }
        let cost = static_script_ram(script) * threads as f64;
        let free = h.max_ram - Self::used_ram(&inner, host);
        if cost <= 0.0 || cost > free + 1e-9 {
            return 0;
        }

        let kind = match WorkerKind::from_script(script) {
            Some(k) => k,
            None => return 0,
        };
        let delay_ms: u64 = args
            .get(1)
            .and_then(|a| a.parse().ok())
            .unwrap_or_default();
        let target_name = args.first().cloned().unwrap_or_default();
        let Some(runtime) = self.runtime_ms(&inner, kind, &target_name) else {
            return 0;
        };

        let pid = inner.next_pid;
        inner.next_pid += 1;
        let cores = inner.hosts.get(host).map_or(1, |h| h.cores);
        let ends_ms = inner.clock_ms + delay_ms + runtime;
        inner.procs.entry(host.to_string()).or_default().push(SimProc {
            pid,
            script: script.to_string(),
            threads,
            args: args.to_vec(),
            ends_ms,
            cores,
        });
        pid
    }

    async fn kill(&self, pid: u32, host: &str) -> bool {
        let mut inner = self.inner.lock();
        let Some(procs) = inner.procs.get_mut(host) else {
            return false;
        };
        let before = procs.len();
        procs.retain(|p| p.pid != pid);
        procs.len() != before
    }

    async fn survey(&self, host: &str) -> Option<ServerInfo> {
        let mut inner = self.inner.lock();
        self.sync(&mut inner);
        let used = Self::used_ram(&inner, host);
        let h = inner.hosts.get(host)?;
        Some(ServerInfo {
            hostname: h.hostname.clone(),
            rooted: h.rooted,
            max_ram: h.max_ram,
            used_ram: used,
            cores: h.cores,
            max_money: h.max_money,
            money: h.money,
            security: h.security,
            min_security: h.min_security,
            growth: h.growth,
            required_level: h.required_level,
            backdoored: h.backdoored,
        })
    }

    async fn script_ram(&self, script: &str) -> f64 {
        static_script_ram(script)
    }

    async fn player(&self) -> PlayerSnapshot {
        self.inner.lock().player
    }

    async fn write_data(&self, key: &str, contents: &str) -> anyhow::Result<()> {
        self.inner
            .lock()
            .artifacts
            .insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

/// A small network for the binary's soak mode: home plus two extra
/// runners and three hackable servers in different states.
pub fn demo_world() -> SimWorld {
    let world = SimWorld::new_realtime(PlayerSnapshot { hacking: 750 });

    let mut home = SimHost::home(512.0, 8);
    home.neighbors = vec!["relay-1".into(), "alpha-mart".into()];
    world.add_host(home);

    for (name, ram) in [("relay-1", 128.0), ("relay-2", 64.0)] {
        world.add_host(SimHost {
            hostname: name.into(),
            neighbors: vec!["home".into(), "omega-net".into()],
            max_ram: ram,
            ..Default::default()
        });
    }

    world.add_host(SimHost {
        hostname: "alpha-mart".into(),
        neighbors: vec!["home".into(), "beta-foods".into()],
        max_money: 2.5e8,
        money: 1.0e7,
        security: 18.0,
        min_security: 10.0,
        growth: 35.0,
        required_level: 200,
        ..Default::default()
    });
    world.add_host(SimHost {
        hostname: "beta-foods".into(),
        neighbors: vec!["alpha-mart".into()],
        max_money: 8.0e7,
        money: 8.0e7,
        security: 8.0,
        min_security: 8.0,
        growth: 40.0,
        required_level: 120,
        ..Default::default()
    });
    world.add_host(SimHost {
        hostname: "omega-net".into(),
        neighbors: vec!["relay-1".into()],
        max_money: 6.0e8,
        money: 3.0e8,
        security: 25.0,
        min_security: 12.0,
        growth: 28.0,
        required_level: 420,
        ..Default::default()
    });

    world
}
