//! Dispatch against the simulated fleet: placement order, ledger
//! accounting, hack splitting and partial-failure handling.

use fleet::sim::{SimHost, SimWorld};
use fleet::types::scripts;
use fleet::{HostControl, HostRegistry, PlayerSnapshot, RunnerSnapshot, WorkerKind, WorkerRam};
use planner::batch::{Batch, BatchKind, GhwPlan, ram_for};
use planner::Tuning;

use orchestrator::dispatch::dispatch_batch;
use orchestrator::ledger::RamLedger;

fn mk_costs() -> WorkerRam {
    WorkerRam {
        hack: 1.70,
        grow: 1.75,
        weaken: 1.75,
        share: 4.0,
    }
}

fn mk_world(home_ram: f64) -> SimWorld {
    let world = SimWorld::new(PlayerSnapshot { hacking: 500 });
    world.add_host(SimHost::home(home_ram, 1));
    world.add_host(SimHost {
        hostname: "victim".into(),
        rooted: true,
        max_money: 1.0e6,
        money: 5.0e5,
        security: 5.0,
        min_security: 5.0,
        growth: 30.0,
        required_level: 100,
        ..Default::default()
    });
    world
}

fn mk_ghw(grow: u32, hack: u32, weaken: u32) -> Batch {
    let costs = mk_costs();
    Batch {
        kind: BatchKind::Ghw(GhwPlan {
            grow,
            hack,
            weaken,
            grow_delay_ms: 200,
            hack_delay_ms: 1_350,
            grow_time_ms: 2_000,
            hack_time_ms: 1_000,
            weaken_time_ms: 2_500,
        }),
        expected_money: 5.0e4,
        expected_security: 5.0,
        ram_gb: ram_for(hack, grow, weaken, &costs),
        duration_ms: 2_500,
    }
}

async fn mk_ledger(world: &SimWorld, registry: &mut HostRegistry) -> RamLedger {
    let info = world.survey("home").await.unwrap();
    RamLedger::build(&[RunnerSnapshot {
        host: registry.intern("home"),
        max_ram: info.max_ram,
        used_ram: info.used_ram,
        cores: info.cores,
    }])
}

#[tokio::test]
async fn full_dispatch_launches_every_kind_in_order() {
    let world = mk_world(512.0);
    let mut registry = HostRegistry::new();
    let mut ledger = mk_ledger(&world, &mut registry).await;

    let batch = mk_ghw(20, 95, 6);
    let outcome = dispatch_batch(
        &world,
        &mut ledger,
        &registry,
        "victim",
        &batch,
        &mk_costs(),
        1.0,
        &Tuning::default(),
    )
    .await;

    assert!(outcome.complete());
    assert_eq!(outcome.launched_total(), 121);

    // One process per kind (no splitting at full chance), launched
    // weaken first, ascending pids.
    let procs = world.processes_on("home");
    assert_eq!(procs.len(), 3);
    let mut by_pid = procs.clone();
    by_pid.sort_by_key(|p| p.pid);
    assert_eq!(by_pid[0].filename, scripts::WEAKEN);
    assert_eq!(by_pid[1].filename, scripts::GROW);
    assert_eq!(by_pid[2].filename, scripts::HACK);

    // Worker args carry (target, delay).
    assert_eq!(by_pid[0].args[0], "victim");
    assert_eq!(by_pid[0].args[1], "0");
    assert_eq!(by_pid[1].args[1], "200");
    assert_eq!(by_pid[2].args[1], "1350");

    // Ledger soundness: what the sim charged equals the plan.
    let info = world.survey("home").await.unwrap();
    assert!((info.used_ram - batch.ram_gb).abs() < 1e-9);
}

#[tokio::test]
async fn unreliable_hack_chance_splits_into_tagged_chunks() {
    let world = mk_world(2_048.0);
    let mut registry = HostRegistry::new();
    let mut ledger = mk_ledger(&world, &mut registry).await;

    let batch = mk_ghw(0, 250, 10);
    let outcome = dispatch_batch(
        &world,
        &mut ledger,
        &registry,
        "victim",
        &batch,
        &mk_costs(),
        0.5,
        &Tuning::default(),
    )
    .await;
    assert!(outcome.complete());

    let hacks: Vec<_> = world
        .processes_on("home")
        .into_iter()
        .filter(|p| p.filename == scripts::HACK)
        .collect();

    // 250 threads in chunks of at most 100: three processes.
    assert_eq!(hacks.len(), 3);
    assert!(hacks.iter().all(|p| p.threads <= 100));
    assert_eq!(hacks.iter().map(|p| p.threads).sum::<u32>(), 250);

    // Distinct numeric tags keep the host from coalescing them.
    let mut tags: Vec<&String> = hacks.iter().filter_map(|p| p.args.get(2)).collect();
    tags.sort();
    tags.dedup();
    assert_eq!(tags.len(), 3);
}

#[tokio::test]
async fn reliable_hack_chance_uses_one_process_per_runner() {
    let world = mk_world(2_048.0);
    let mut registry = HostRegistry::new();
    let mut ledger = mk_ledger(&world, &mut registry).await;

    let batch = mk_ghw(0, 250, 10);
    let outcome = dispatch_batch(
        &world,
        &mut ledger,
        &registry,
        "victim",
        &batch,
        &mk_costs(),
        0.99,
        &Tuning::default(),
    )
    .await;
    assert!(outcome.complete());

    let hacks: Vec<_> = world
        .processes_on("home")
        .into_iter()
        .filter(|p| p.filename == scripts::HACK)
        .collect();
    assert_eq!(hacks.len(), 1);
    assert_eq!(hacks[0].threads, 250);
}

#[tokio::test]
async fn dispatch_spreads_across_runners_largest_first() {
    let world = mk_world(64.0);
    world.add_host(SimHost {
        hostname: "relay-1".into(),
        rooted: true,
        max_ram: 256.0,
        files: scripts::ALL.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    });

    let mut registry = HostRegistry::new();
    let home_info = world.survey("home").await.unwrap();
    let relay_info = world.survey("relay-1").await.unwrap();
    let mut ledger = RamLedger::build(&[
        RunnerSnapshot {
            host: registry.intern("home"),
            max_ram: home_info.max_ram,
            used_ram: home_info.used_ram,
            cores: home_info.cores,
        },
        RunnerSnapshot {
            host: registry.intern("relay-1"),
            max_ram: relay_info.max_ram,
            used_ram: relay_info.used_ram,
            cores: relay_info.cores,
        },
    ]);

    // 160 grow threads (280 GB) cannot fit on either runner alone.
    let batch = Batch {
        kind: BatchKind::Ghw(GhwPlan {
            grow: 160,
            hack: 1,
            weaken: 14,
            grow_delay_ms: 200,
            hack_delay_ms: 1_350,
            grow_time_ms: 2_000,
            hack_time_ms: 1_000,
            weaken_time_ms: 2_500,
        }),
        expected_money: 5.0e4,
        expected_security: 5.0,
        ram_gb: ram_for(1, 160, 14, &mk_costs()),
        duration_ms: 2_500,
    };

    let outcome = dispatch_batch(
        &world,
        &mut ledger,
        &registry,
        "victim",
        &batch,
        &mk_costs(),
        1.0,
        &Tuning::default(),
    )
    .await;
    assert!(outcome.complete());

    // Both runners ended up hosting grow threads; the bigger one first.
    let relay_grow: u32 = world
        .processes_on("relay-1")
        .iter()
        .filter(|p| p.filename == scripts::GROW)
        .map(|p| p.threads)
        .sum();
    let home_grow: u32 = world
        .processes_on("home")
        .iter()
        .filter(|p| p.filename == scripts::GROW)
        .map(|p| p.threads)
        .sum();
    assert_eq!(relay_grow + home_grow, 160);
    assert!(relay_grow > home_grow);
}

#[tokio::test]
async fn ram_race_yields_partial_dispatch_without_retraction() {
    let world = mk_world(64.0);
    let mut registry = HostRegistry::new();

    // Ledger believes home has far more headroom than it does.
    let mut ledger = RamLedger::build(&[RunnerSnapshot {
        host: registry.intern("home"),
        max_ram: 512.0,
        used_ram: 0.0,
        cores: 1,
    }]);

    let batch = mk_ghw(20, 95, 6);
    let outcome = dispatch_batch(
        &world,
        &mut ledger,
        &registry,
        "victim",
        &batch,
        &mk_costs(),
        1.0,
        &Tuning::default(),
    )
    .await;

    assert!(!outcome.complete());
    let shortfalls: Vec<_> = outcome.shortfalls().collect();
    assert!(!shortfalls.is_empty());

    // Whatever did launch stays launched.
    let launched = outcome.launched_total();
    assert!(launched > 0);
    let live: u32 = world.processes_on("home").iter().map(|p| p.threads).sum();
    assert_eq!(live, launched);

    // The weaken wave (launched first) got its full allocation.
    let weaken = outcome
        .kinds
        .iter()
        .find(|k| k.kind == WorkerKind::Weaken)
        .unwrap();
    assert_eq!(weaken.launched, weaken.planned);
}
