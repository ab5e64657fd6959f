use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Minimal counters for operational visibility. Observability only;
/// nothing in the scheduler reads them back.
#[derive(Clone, Default)]
pub struct Counters {
    pub ticks: Arc<AtomicU64>,

    pub batches_dispatched: Arc<AtomicU64>,
    pub prep_batches: Arc<AtomicU64>,
    pub downscaled_batches: Arc<AtomicU64>,
    pub dropped_plans: Arc<AtomicU64>,
    pub partial_dispatches: Arc<AtomicU64>,

    pub share_launches: Arc<AtomicU64>,
    pub share_reclaims: Arc<AtomicU64>,

    pub overlaps: Arc<AtomicU64>,
    pub overhacks: Arc<AtomicU64>,
    pub no_runner_ticks: Arc<AtomicU64>,
}

impl Counters {
    pub fn bump(counter: &Arc<AtomicU64>) {
        counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}
