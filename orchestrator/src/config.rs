/// Orchestrator configuration.
///
/// The CLI surface maps onto this; everything else keeps its default.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Tick cadence in milliseconds.
    ///
    /// One tick runs the whole pipeline to completion; the loop then
    /// sleeps until the next tick. Ticks never overlap.
    pub tick_interval_ms: u64,

    /// Omit the home host from the runner pool.
    ///
    /// Useful when home RAM is reserved for interactive scripts.
    pub ignore_home: bool,

    /// Use the model's closed-form grow-thread formula instead of
    /// searching the approximation function.
    pub closed_form_grow: bool,

    /// Maximum number of *fresh* targets admitted per tick.
    ///
    /// Follow-up batches for targets already in the prep/income loop are
    /// not counted against this; the cap only limits how fast the
    /// orchestrator takes on new hosts.
    pub max_fresh_targets: usize,

    /// Targets with a growth rate below this are never admitted;
    /// regrowing them costs more RAM than they return.
    pub min_growth: f64,

    /// Hostnames that are never hacked, no matter their score.
    pub blacklist: Vec<String>,

    /// Hostname the orchestrator itself runs on; source of the worker
    /// scripts seeded onto runners.
    pub home_host: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            ignore_home: false,
            closed_form_grow: false,
            max_fresh_targets: 3,
            min_growth: 15.0,
            blacklist: vec!["fulcrumassets".to_string()],
            home_host: "home".to_string(),
        }
    }
}
