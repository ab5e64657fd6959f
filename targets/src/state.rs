//! Mutable per-target record.

use planner::{Batch, Shape, Tuning};

use crate::phase::Phase;

/// Diagnostics of the most recent batch, retained across one completion
/// so over-hack incidents can explain what was dispatched.
#[derive(Debug, Clone, Copy)]
pub struct LastBatchInfo {
    pub shape: Shape,
    pub hack_threads: u32,
    pub grow_threads: u32,
    pub weaken_threads: u32,
    pub pre_money: f64,
    pub pre_security: f64,
    pub hack_delay_ms: u64,
    pub hack_time_ms: u64,
    pub weaken_time_ms: u64,
    pub backdoored: bool,
    pub dispatched_at_ms: u64,
}

impl LastBatchInfo {
    /// Slack between the weaken landing and the hack landing. A negative
    /// margin means the hack landed after its counter-weaken, which is
    /// exactly how over-hacks happen.
    pub fn timing_margin_ms(&self) -> i64 {
        self.weaken_time_ms as i64 - (self.hack_delay_ms + self.hack_time_ms) as i64
    }
}

/// What a completion check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// No batch, or the batch is still in flight.
    None,
    /// Batch finished; the target is ready for new work.
    Ready,
    /// Batch finished with money below the over-hack floor. The target
    /// is still ready; the caller records the incident.
    OverHacked,
    /// Prep finished but security is still above tolerance.
    StillUnprepped,
}

/// Mutable record for one target. Created lazily on first observation,
/// reset when a completion is detected, never destroyed.
#[derive(Debug, Clone, Default)]
pub struct TargetState {
    pub phase: Phase,
    /// Monotonic end time of the in-flight batch; 0 when idle.
    pub batch_end_ms: u64,
    pub batch_shape: Option<Shape>,
    pub batch_threads_total: u32,
    pub last_batch: Option<LastBatchInfo>,
    pub profit_score: f64,
    /// Completed income cycles, for operational visibility.
    pub cycles_completed: u64,
    /// Whether this target has ever had a batch dispatched; used by
    /// admission to tell recovery work from fresh work.
    pub ever_dispatched: bool,
    /// Post-completion stagger: no new batch until this time.
    cooldown_until_ms: u64,
}

impl TargetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Busy per the time estimate. The live-thread check in recovery is
    /// the authoritative complement to this.
    pub fn is_busy(&self, now_ms: u64, tuning: &Tuning) -> bool {
        if self.batch_end_ms > 0 && now_ms < self.batch_end_ms + tuning.stagger_grace_ms {
            return true;
        }
        now_ms < self.cooldown_until_ms
    }

    /// Record a dispatched batch and enter its in-flight phase.
    pub fn on_dispatch(&mut self, batch: &Batch, now_ms: u64, info: LastBatchInfo) {
        self.phase = match batch.shape() {
            Shape::PrepWeaken => Phase::Prepping,
            Shape::Hw => Phase::HwInflight,
            Shape::Gw => Phase::GwInflight,
            Shape::Ghw => Phase::GhwInflight,
        };
        self.batch_end_ms = now_ms + batch.duration_ms;
        self.batch_shape = Some(batch.shape());
        self.batch_threads_total = batch.total_threads();
        self.last_batch = Some(info);
        self.ever_dispatched = true;
    }

    /// Adopt a phase inferred from live worker processes (restart
    /// recovery). `end_ms` is the conservative completion estimate.
    pub fn adopt_recovered(&mut self, phase: Phase, end_ms: u64, threads_total: u32) {
        self.phase = phase;
        self.batch_end_ms = end_ms;
        self.batch_shape = None;
        self.batch_threads_total = threads_total;
        self.ever_dispatched = true;
    }

    /// Advance the machine against the latest observation. Clears batch
    /// bookkeeping when the in-flight batch has elapsed.
    pub fn advance(
        &mut self,
        now_ms: u64,
        money: f64,
        max_money: f64,
        security: f64,
        min_security: f64,
        tuning: &Tuning,
    ) -> Completion {
        if self.batch_end_ms == 0 {
            // Idle: an unprepped target whose security is already inside
            // tolerance skips prep entirely.
            if self.phase == Phase::Unprepped
                && security <= min_security + tuning.prep_epsilon
            {
                self.phase = Phase::Ready;
            }
            return Completion::None;
        }
        if now_ms < self.batch_end_ms {
            return Completion::None;
        }

        let finished_phase = self.phase;
        self.clear_batch(tuning);

        match finished_phase {
            Phase::Prepping => {
                if security <= min_security + tuning.prep_epsilon {
                    self.phase = Phase::Ready;
                    Completion::Ready
                } else {
                    self.phase = Phase::Unprepped;
                    Completion::StillUnprepped
                }
            }
            phase => {
                self.phase = Phase::Ready;
                if phase.is_inflight() && !phase.is_prep() {
                    self.cycles_completed += 1;
                }
                if phase.hack_in_flight() && money < tuning.overhack_floor * max_money {
                    Completion::OverHacked
                } else {
                    Completion::Ready
                }
            }
        }
    }

    fn clear_batch(&mut self, tuning: &Tuning) {
        self.cooldown_until_ms = self.batch_end_ms + tuning.stagger_grace_ms;
        self.batch_end_ms = 0;
        self.batch_shape = None;
        self.batch_threads_total = 0;
        // last_batch is kept for one completion's worth of diagnostics;
        // the next dispatch overwrites it.
    }
}
