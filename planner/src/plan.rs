//! Shape selection.
//!
//! Given a target snapshot, emit the batch the orchestrator should try
//! first, and the split fallback for when the combined shape is too big
//! or cannot be funded. All decisions are deterministic functions of the
//! snapshot.

use fleet::{HackingModel, PlayerSnapshot, TargetSnapshot, WorkerRam};
use tracing::debug;

use crate::batch::{Batch, BatchKind, GhwPlan, GwPlan, HwPlan, PrepWeakenPlan, ram_for};
use crate::threads::{counter_weaken, grow_to_full, hack_to_floor, weaken_to_min};
use crate::tuning::Tuning;

/// Stateless batch planner over a hacking model.
pub struct Planner<'a, M: HackingModel> {
    pub model: &'a M,
    pub tuning: &'a Tuning,
    pub costs: &'a WorkerRam,
    /// Use the model's closed-form grow threads when available.
    pub closed_form_grow: bool,
}

impl<'a, M: HackingModel> Planner<'a, M> {
    pub fn new(model: &'a M, tuning: &'a Tuning, costs: &'a WorkerRam, closed_form_grow: bool) -> Self {
        Self {
            model,
            tuning,
            costs,
            closed_form_grow,
        }
    }

    /// Whether the target's security is within the prep tolerance.
    pub fn is_prepped(&self, target: &TargetSnapshot) -> bool {
        target.security <= target.min_security + self.tuning.prep_epsilon
    }

    /// The batch to try first for a ready target.
    ///
    /// Security drift (unless money is simultaneously below the floor)
    /// takes priority over income; otherwise the combined shape is
    /// preferred while its total stays under the thread cap.
    pub fn preferred(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> Option<Batch> {
        if !self.costs.batch_kinds_known() {
            debug!("worker RAM costs unknown; refusing to plan");
            return None;
        }

        let below_floor = target.money < self.tuning.money_floor * target.max_money;
        if !self.is_prepped(target) && !below_floor {
            return self.prep(target, player);
        }

        if let Some(batch) = self.ghw(target, player) {
            if batch.total_threads() <= self.tuning.ghw_max_threads {
                return Some(batch);
            }
            debug!(
                target_host = %target.host,
                total = batch.total_threads(),
                cap = self.tuning.ghw_max_threads,
                "combined batch over thread cap; falling back to split shape"
            );
        }
        self.fallback(target, player)
    }

    /// The split shape used when the combined batch is rejected: grow
    /// when money is short of full, hack when it is there already.
    pub fn fallback(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> Option<Batch> {
        if !self.costs.batch_kinds_known() {
            return None;
        }
        if target.money < self.tuning.money_threshold * target.max_money {
            self.gw(target, player)
        } else {
            self.hw(target, player)
        }
    }

    /// Single weaken wave down to minimum security.
    pub fn prep(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> Option<Batch> {
        let per_thread = self.tuning.sec_per_weaken;
        let weaken = weaken_to_min(target.excess_security(), per_thread)?;
        if weaken == 0 {
            return None;
        }
        let weaken_time_ms = self.model.weaken_time_ms(target, player);
        Some(Batch {
            kind: BatchKind::PrepWeaken(PrepWeakenPlan {
                weaken,
                weaken_time_ms,
            }),
            expected_money: target.money,
            expected_security: target.min_security,
            ram_gb: ram_for(0, 0, weaken, self.costs),
            duration_ms: weaken_time_ms,
        })
    }

    /// Combined grow + hack + weaken cycle. Hack threads are sized
    /// against full money since the grow lands first.
    fn ghw(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> Option<Batch> {
        let tuning = self.tuning;
        let grow = grow_to_full(
            self.model,
            target,
            player,
            1,
            self.closed_form_grow,
            tuning,
        )?;
        let hack = hack_to_floor(
            target.max_money,
            target.max_money,
            self.model.hack_percent(target, player),
            self.model.hack_chance(target, player),
            tuning,
        )?;
        if hack == 0 {
            return None;
        }
        let weaken = counter_weaken(hack, grow, target.excess_security(), tuning);

        let hack_time_ms = self.model.hack_time_ms(target, player);
        let grow_time_ms = self.model.grow_time_ms(target, player);
        let weaken_time_ms = self.model.weaken_time_ms(target, player);
        let buffer = tuning.land_buffer_ms;

        Some(Batch {
            kind: BatchKind::Ghw(GhwPlan {
                grow,
                hack,
                weaken,
                grow_delay_ms: weaken_time_ms.saturating_sub(2 * buffer + grow_time_ms),
                hack_delay_ms: weaken_time_ms.saturating_sub(buffer + hack_time_ms),
                grow_time_ms,
                hack_time_ms,
                weaken_time_ms,
            }),
            expected_money: tuning.money_floor * target.max_money,
            expected_security: target.min_security,
            ram_gb: ram_for(hack, grow, weaken, self.costs),
            duration_ms: weaken_time_ms,
        })
    }

    /// Hack + counter-weaken against the target's current money.
    fn hw(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> Option<Batch> {
        let tuning = self.tuning;
        let hack = hack_to_floor(
            target.money,
            target.max_money,
            self.model.hack_percent(target, player),
            self.model.hack_chance(target, player),
            tuning,
        )?;
        if hack == 0 {
            return None;
        }
        let weaken = counter_weaken(hack, 0, target.excess_security(), tuning);

        let hack_time_ms = self.model.hack_time_ms(target, player);
        let weaken_time_ms = self.model.weaken_time_ms(target, player);

        Some(Batch {
            kind: BatchKind::Hw(HwPlan {
                hack,
                weaken,
                hack_delay_ms: weaken_time_ms.saturating_sub(tuning.land_buffer_ms + hack_time_ms),
                hack_time_ms,
                weaken_time_ms,
            }),
            expected_money: tuning.money_floor * target.max_money,
            expected_security: target.min_security,
            ram_gb: ram_for(hack, 0, weaken, self.costs),
            duration_ms: weaken_time_ms,
        })
    }

    /// Grow + counter-weaken back up to full money.
    fn gw(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> Option<Batch> {
        let tuning = self.tuning;
        let grow = grow_to_full(
            self.model,
            target,
            player,
            1,
            self.closed_form_grow,
            tuning,
        )?;
        if grow == 0 {
            return None;
        }
        let weaken = counter_weaken(0, grow, target.excess_security(), tuning);

        let grow_time_ms = self.model.grow_time_ms(target, player);
        let weaken_time_ms = self.model.weaken_time_ms(target, player);

        Some(Batch {
            kind: BatchKind::Gw(GwPlan {
                grow,
                weaken,
                grow_delay_ms: weaken_time_ms.saturating_sub(tuning.land_buffer_ms + grow_time_ms),
                grow_time_ms,
                weaken_time_ms,
            }),
            expected_money: target.max_money,
            expected_security: target.min_security,
            ram_gb: ram_for(0, grow, weaken, self.costs),
            duration_ms: weaken_time_ms,
        })
    }
}
