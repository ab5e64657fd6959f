//! RAM-bounded plan contraction.
//!
//! Shrinks a batch until it fits the remaining fleet RAM while keeping
//! its shape and landing order intact. Thread counts only ever go down,
//! and a batch that hacked at all keeps at least one hack thread.

use fleet::{WorkerKind, WorkerRam};
use tracing::debug;

use crate::batch::{Batch, BatchKind, ram_for};
use crate::threads::counter_weaken;
use crate::tuning::Tuning;

/// Bounded number of contraction attempts before giving up.
const MAX_ROUNDS: u32 = 20;

/// Per-round shrink applied to the scale factor when a proposal still
/// does not fit.
const SHRINK: f64 = 0.85;

/// Fit `batch` into `avail_gb`, returning the contracted plan or `None`
/// when even the smallest viable plan is too big.
///
/// `excess_security` is the target's current drift above minimum; the
/// counter-weaken is recomputed from it for every proposal.
pub fn downscale(
    batch: &Batch,
    avail_gb: f64,
    costs: &WorkerRam,
    tuning: &Tuning,
    excess_security: f64,
) -> Option<Batch> {
    if batch.ram_gb <= avail_gb {
        return Some(batch.clone());
    }

    // Prep weaken shrinks by direct clamp: a partial weaken still makes
    // progress and the next tick tops it up.
    if let BatchKind::PrepWeaken(p) = &batch.kind {
        if costs.weaken <= 0.0 {
            return None;
        }
        let affordable = (avail_gb / costs.weaken).floor() as u32;
        let weaken = p.weaken.min(affordable);
        if weaken == 0 {
            return None;
        }
        let removed = weaken as f64 * tuning.sec_per_weaken;
        let mut shrunk = batch.clone();
        shrunk.kind = BatchKind::PrepWeaken(crate::batch::PrepWeakenPlan {
            weaken,
            weaken_time_ms: p.weaken_time_ms,
        });
        shrunk.ram_gb = ram_for(0, 0, weaken, costs);
        shrunk.expected_security =
            batch.expected_security + (excess_security - removed).max(0.0);
        return Some(shrunk);
    }

    let orig_hack = batch.threads(WorkerKind::Hack);
    let orig_grow = batch.threads(WorkerKind::Grow);

    let mut scale = avail_gb / batch.ram_gb;
    for round in 0..MAX_ROUNDS {
        let grow = (orig_grow as f64 * scale).floor() as u32;
        let hack = if orig_hack > 0 {
            ((orig_hack as f64 * scale).floor() as u32).max(1)
        } else {
            0
        };
        let weaken = counter_weaken(hack, grow, excess_security, tuning);
        let ram = ram_for(hack, grow, weaken, costs);

        if ram <= avail_gb && hack + grow + weaken > 0 && (orig_hack == 0 || hack > 0) {
            debug!(
                round,
                hack,
                grow,
                weaken,
                ram_gb = ram,
                avail_gb,
                "downscaled batch to fit"
            );
            return Some(rebuild(batch, hack, grow, weaken, ram));
        }
        scale *= SHRINK;
    }

    debug!(avail_gb, ram_gb = batch.ram_gb, "downscale failed; batch dropped");
    None
}

/// Same shape and delays, new thread counts.
fn rebuild(batch: &Batch, hack: u32, grow: u32, weaken: u32, ram_gb: f64) -> Batch {
    let mut out = batch.clone();
    out.ram_gb = ram_gb;
    out.kind = match batch.kind {
        BatchKind::PrepWeaken(p) => {
            BatchKind::PrepWeaken(crate::batch::PrepWeakenPlan { weaken, ..p })
        }
        BatchKind::Hw(p) => BatchKind::Hw(crate::batch::HwPlan { hack, weaken, ..p }),
        BatchKind::Gw(p) => BatchKind::Gw(crate::batch::GwPlan { grow, weaken, ..p }),
        BatchKind::Ghw(p) => BatchKind::Ghw(crate::batch::GhwPlan {
            grow,
            hack,
            weaken,
            ..p
        }),
    };
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{GhwPlan, GwPlan, PrepWeakenPlan, Shape};

    fn mk_costs() -> WorkerRam {
        WorkerRam {
            hack: 1.70,
            grow: 1.75,
            weaken: 1.75,
            share: 4.0,
        }
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

    #[test]
    fn fitting_batch_is_returned_unchanged() {
        let batch = mk_ghw(20, 95, 6);
        let out = downscale(&batch, 512.0, &mk_costs(), &Tuning::default(), 0.0).unwrap();
        assert_eq!(out, batch);
    }

    #[test]
    fn downscale_is_idempotent_once_it_fits() {
        let tuning = Tuning::default();
        let costs = mk_costs();
        let batch = mk_ghw(20, 95, 6);

        let once = downscale(&batch, 64.0, &costs, &tuning, 0.0).unwrap();
        let twice = downscale(&once, 64.0, &costs, &tuning, 0.0).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn scenario_one_fits_sixty_four_gigs() {
        let tuning = Tuning::default();
        let costs = mk_costs();
        // 207 GB plan against a 64 GB runner.
        let batch = mk_ghw(20, 95, 6);

        let out = downscale(&batch, 64.0, &costs, &tuning, 0.0).unwrap();
        assert_eq!(out.shape(), Shape::Ghw);
        assert!(out.ram_gb <= 64.0);
        assert!(out.threads(WorkerKind::Hack) >= 1);
        assert!(out.threads(WorkerKind::Grow) <= 20);
        assert!(out.threads(WorkerKind::Hack) <= 95);
        assert!(out.threads(WorkerKind::Weaken) <= 6);
        // Delays survive contraction; landing order is untouched.
        let BatchKind::Ghw(p) = out.kind else {
            unreachable!()
        };
        assert_eq!(p.hack_delay_ms, 1_350);
        assert_eq!(p.grow_delay_ms, 200);
    }

    #[test]
    fn grow_only_plan_may_shrink_to_zero_grow_but_not_vanish() {
        let tuning = Tuning::default();
        let costs = mk_costs();
        let batch = Batch {
            kind: BatchKind::Gw(GwPlan {
                grow: 100,
                weaken: 8,
                grow_delay_ms: 350,
                grow_time_ms: 2_000,
                weaken_time_ms: 2_500,
            }),
            expected_money: 1.0e6,
            expected_security: 5.0,
            ram_gb: ram_for(0, 100, 8, &costs),
            duration_ms: 2_500,
        };

        let out = downscale(&batch, 10.0, &costs, &tuning, 0.0).unwrap();
        assert_eq!(out.shape(), Shape::Gw);
        assert!(out.ram_gb <= 10.0);
        assert!(out.total_threads() > 0);
        assert_eq!(out.threads(WorkerKind::Hack), 0);
    }

    #[test]
    fn impossible_fit_returns_none() {
        let tuning = Tuning::default();
        let costs = mk_costs();
        let batch = mk_ghw(20, 95, 6);
        // Not even one hack thread fits.
        assert!(downscale(&batch, 1.0, &costs, &tuning, 0.0).is_none());
    }

    #[test]
    fn prep_weaken_clamps_to_affordable_threads() {
        let tuning = Tuning::default();
        let costs = mk_costs();
        let batch = Batch {
            kind: BatchKind::PrepWeaken(PrepWeakenPlan {
                weaken: 260,
                weaken_time_ms: 2_500,
            }),
            expected_money: 1.0e5,
            expected_security: 5.0,
            ram_gb: ram_for(0, 0, 260, &costs),
            duration_ms: 2_500,
        };

        // 35 GB / 1.75 = 20 threads.
        let out = downscale(&batch, 35.0, &costs, &tuning, 13.0).unwrap();
        assert_eq!(out.threads(WorkerKind::Weaken), 20);
        assert!(out.ram_gb <= 35.0);
        // 20 threads remove 1.0 security; 12 points of drift remain.
        assert!((out.expected_security - 17.0).abs() < 1e-9);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use crate::batch::{GhwPlan, Shape};
    use proptest::prelude::*;

    fn mk_costs() -> WorkerRam {
        WorkerRam {
            hack: 1.70,
            grow: 1.75,
            weaken: 1.75,
            share: 4.0,
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]
        #[test]
        fn downscale_invariants(
            grow in 0..5_000u32,
            hack in 1..5_000u32,
            excess in 0.0..20.0f64,
            avail in 1.0..10_000.0f64,
        ) {
            let tuning = Tuning::default();
            let costs = mk_costs();
            let weaken = crate::threads::counter_weaken(hack, grow, excess, &tuning);
            let batch = Batch {
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
                expected_money: 0.0,
                expected_security: 0.0,
                ram_gb: ram_for(hack, grow, weaken, &costs),
                duration_ms: 2_500,
            };

            if let Some(out) = downscale(&batch, avail, &costs, &tuning, excess) {
                // --- Fits the budget ---
                prop_assert!(out.ram_gb <= avail + 1e-9);

                // --- Shape preserved ---
                prop_assert_eq!(out.shape(), Shape::Ghw);

                // --- No thread count ever grows ---
                prop_assert!(out.threads(WorkerKind::Grow) <= grow);
                prop_assert!(out.threads(WorkerKind::Hack) <= hack);
                prop_assert!(out.threads(WorkerKind::Weaken) <= weaken);

                // --- Hack floor preserved ---
                prop_assert!(out.threads(WorkerKind::Hack) >= 1);

                // --- Stated RAM matches the thread counts ---
                let recomputed = ram_for(
                    out.threads(WorkerKind::Hack),
                    out.threads(WorkerKind::Grow),
                    out.threads(WorkerKind::Weaken),
                    &costs,
                );
                prop_assert!((recomputed - out.ram_gb).abs() < 1e-9);
            }
        }

        #[test]
        fn downscale_idempotent_on_fitting_plans(
            grow in 0..500u32,
            hack in 1..500u32,
        ) {
            let tuning = Tuning::default();
            let costs = mk_costs();
            let weaken = crate::threads::counter_weaken(hack, grow, 0.0, &tuning);
            let batch = Batch {
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
                expected_money: 0.0,
                expected_security: 0.0,
                ram_gb: ram_for(hack, grow, weaken, &costs),
                duration_ms: 2_500,
            };

            let out = downscale(&batch, batch.ram_gb, &costs, &tuning, 0.0).unwrap();
            prop_assert_eq!(out, batch);
        }
    }
}
