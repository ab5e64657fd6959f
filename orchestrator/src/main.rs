use std::sync::Arc;

use clap::Parser;

use fleet::FormulaModel;
use fleet::sim;
use orchestrator::{Orchestrator, OrchestratorConfig};

/// Fleet batch orchestrator.
///
/// Runs the prep/income scheduler against the built-in simulated
/// network. Real deployments implement `fleet::HostControl` over the
/// game's process-control surface and swap it in here.
#[derive(Debug, Parser)]
#[clap(name = "orchestrator", version)]
struct Cli {
    /// Omit the home host from the runner pool
    #[clap(long, default_value_t = false)]
    ignore_home: bool,

    /// Use the closed-form hacking model for grow sizing
    #[clap(long, default_value_t = false)]
    formulas: bool,

    /// Fresh targets admitted per tick (N >= 1)
    #[clap(long = "targets", default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
    max_targets: u16,

    /// Tick cadence in milliseconds
    #[clap(long, default_value_t = 1_000)]
    tick_ms: u64,

    /// Minimum growth rate a target needs to be admitted
    #[clap(long, default_value_t = 15.0)]
    min_growth: f64,

    /// Emit JSON logs instead of human-readable output
    #[clap(long, default_value_t = false)]
    json_logs: bool,
}

fn config_from_cli(cli: &Cli) -> OrchestratorConfig {
    OrchestratorConfig {
        tick_interval_ms: cli.tick_ms,
        ignore_home: cli.ignore_home,
        closed_form_grow: cli.formulas,
        max_fresh_targets: cli.max_targets as usize,
        min_growth: cli.min_growth,
        ..OrchestratorConfig::default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    common::logger::init_tracing("orchestrator", cli.json_logs);

    let cfg = config_from_cli(&cli);
    tracing::info!(?cfg, "starting orchestrator");

    let world = Arc::new(sim::demo_world());
    let engine = Orchestrator::init(world, FormulaModel, cfg).await?;

    let handle = tokio::spawn(engine.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");
    handle.abort();

    Ok(())
}
