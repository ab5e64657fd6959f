//! Batch shapes.
//!
//! A batch is a tagged variant over the four shapes; downstream code
//! dispatches on the tag instead of probing nullable fields. Delays are
//! chosen so effects land in shape order regardless of launch order.

use std::fmt;

use fleet::{WorkerKind, WorkerRam};

/// Fieldless shape tag, kept in target state for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    PrepWeaken,
    Hw,
    Gw,
    Ghw,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Shape::PrepWeaken => "prep-weaken",
            Shape::Hw => "hack-weaken",
            Shape::Gw => "grow-weaken",
            Shape::Ghw => "grow-hack-weaken",
        };
        f.write_str(s)
    }
}

/// Single weaken wave bringing security down to minimum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepWeakenPlan {
    pub weaken: u32,
    pub weaken_time_ms: u64,
}

/// Hack plus counter-weaken; hack lands first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HwPlan {
    pub hack: u32,
    pub weaken: u32,
    pub hack_delay_ms: u64,
    pub hack_time_ms: u64,
    pub weaken_time_ms: u64,
}

/// Grow plus counter-weaken; grow lands first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GwPlan {
    pub grow: u32,
    pub weaken: u32,
    pub grow_delay_ms: u64,
    pub grow_time_ms: u64,
    pub weaken_time_ms: u64,
}

/// Combined cycle: grow, then hack, then weaken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GhwPlan {
    pub grow: u32,
    pub hack: u32,
    pub weaken: u32,
    pub grow_delay_ms: u64,
    pub hack_delay_ms: u64,
    pub grow_time_ms: u64,
    pub hack_time_ms: u64,
    pub weaken_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchKind {
    PrepWeaken(PrepWeakenPlan),
    Hw(HwPlan),
    Gw(GwPlan),
    Ghw(GhwPlan),
}

/// One worker launch within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launch {
    pub kind: WorkerKind,
    pub threads: u32,
    pub delay_ms: u64,
}

/// A planned unit of work for one target.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub kind: BatchKind,
    /// Money expected on the target once everything has landed.
    pub expected_money: f64,
    /// Security expected once everything has landed.
    pub expected_security: f64,
    /// Total RAM this batch needs across the fleet, in GB.
    pub ram_gb: f64,
    /// Time from launch until the last landing (the weaken end).
    pub duration_ms: u64,
}

impl Batch {
    pub fn shape(&self) -> Shape {
        match self.kind {
            BatchKind::PrepWeaken(_) => Shape::PrepWeaken,
            BatchKind::Hw(_) => Shape::Hw,
            BatchKind::Gw(_) => Shape::Gw,
            BatchKind::Ghw(_) => Shape::Ghw,
        }
    }

    pub fn threads(&self, kind: WorkerKind) -> u32 {
        match (&self.kind, kind) {
            (BatchKind::PrepWeaken(p), WorkerKind::Weaken) => p.weaken,
            (BatchKind::Hw(p), WorkerKind::Hack) => p.hack,
            (BatchKind::Hw(p), WorkerKind::Weaken) => p.weaken,
            (BatchKind::Gw(p), WorkerKind::Grow) => p.grow,
            (BatchKind::Gw(p), WorkerKind::Weaken) => p.weaken,
            (BatchKind::Ghw(p), WorkerKind::Grow) => p.grow,
            (BatchKind::Ghw(p), WorkerKind::Hack) => p.hack,
            (BatchKind::Ghw(p), WorkerKind::Weaken) => p.weaken,
            _ => 0,
        }
    }

    pub fn total_threads(&self) -> u32 {
        self.threads(WorkerKind::Hack) + self.threads(WorkerKind::Grow)
            + self.threads(WorkerKind::Weaken)
    }

    /// Launches in dispatch order: weaken first (zero delay), then the
    /// delayed kinds. Zero-thread kinds are omitted.
    pub fn launches(&self) -> Vec<Launch> {
        let mut out = Vec::with_capacity(3);
        match self.kind {
            BatchKind::PrepWeaken(p) => {
                out.push(Launch {
                    kind: WorkerKind::Weaken,
                    threads: p.weaken,
                    delay_ms: 0,
                });
            }
            BatchKind::Hw(p) => {
                out.push(Launch {
                    kind: WorkerKind::Weaken,
                    threads: p.weaken,
                    delay_ms: 0,
                });
                out.push(Launch {
                    kind: WorkerKind::Hack,
                    threads: p.hack,
                    delay_ms: p.hack_delay_ms,
                });
            }
            BatchKind::Gw(p) => {
                out.push(Launch {
                    kind: WorkerKind::Weaken,
                    threads: p.weaken,
                    delay_ms: 0,
                });
                out.push(Launch {
                    kind: WorkerKind::Grow,
                    threads: p.grow,
                    delay_ms: p.grow_delay_ms,
                });
            }
            BatchKind::Ghw(p) => {
                out.push(Launch {
                    kind: WorkerKind::Weaken,
                    threads: p.weaken,
                    delay_ms: 0,
                });
                out.push(Launch {
                    kind: WorkerKind::Grow,
                    threads: p.grow,
                    delay_ms: p.grow_delay_ms,
                });
                out.push(Launch {
                    kind: WorkerKind::Hack,
                    threads: p.hack,
                    delay_ms: p.hack_delay_ms,
                });
            }
        }
        out.retain(|l| l.threads > 0);
        out
    }
}

/// Fleet RAM needed for a batch's thread counts.
pub fn ram_for(hack: u32, grow: u32, weaken: u32, costs: &WorkerRam) -> f64 {
    hack as f64 * costs.hack + grow as f64 * costs.grow + weaken as f64 * costs.weaken
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_ghw() -> Batch {
        Batch {
            kind: BatchKind::Ghw(GhwPlan {
                grow: 20,
                hack: 95,
                weaken: 6,
                grow_delay_ms: 200,
                hack_delay_ms: 1_350,
                grow_time_ms: 2_000,
                hack_time_ms: 1_000,
                weaken_time_ms: 2_500,
            }),
            expected_money: 5.0e4,
            expected_security: 5.0,
            ram_gb: 207.0,
            duration_ms: 2_500,
        }
    }

    #[test]
    fn launches_in_dispatch_order_weaken_grow_hack() {
        let kinds: Vec<WorkerKind> = mk_ghw().launches().iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![WorkerKind::Weaken, WorkerKind::Grow, WorkerKind::Hack]
        );
    }

    #[test]
    fn landing_order_is_grow_hack_weaken() {
        let batch = mk_ghw();
        let lands: Vec<(WorkerKind, u64)> = batch
            .launches()
            .iter()
            .map(|l| {
                let runtime = match (l.kind, &batch.kind) {
                    (WorkerKind::Grow, BatchKind::Ghw(p)) => p.grow_time_ms,
                    (WorkerKind::Hack, BatchKind::Ghw(p)) => p.hack_time_ms,
                    (WorkerKind::Weaken, BatchKind::Ghw(p)) => p.weaken_time_ms,
                    _ => unreachable!(),
                };
                (l.kind, l.delay_ms + runtime)
            })
            .collect();

        let grow = lands.iter().find(|(k, _)| *k == WorkerKind::Grow).unwrap().1;
        let hack = lands.iter().find(|(k, _)| *k == WorkerKind::Hack).unwrap().1;
        let weaken = lands.iter().find(|(k, _)| *k == WorkerKind::Weaken).unwrap().1;

        assert!(grow < hack && hack < weaken);
        assert_eq!(hack - grow, 150);
        assert_eq!(weaken - hack, 150);
    }

    #[test]
    fn zero_thread_kinds_are_not_launched() {
        let mut batch = mk_ghw();
        if let BatchKind::Ghw(ref mut p) = batch.kind {
            p.grow = 0;
        }
        assert!(batch.launches().iter().all(|l| l.kind != WorkerKind::Grow));
    }

    #[test]
    fn ram_matches_hand_computation() {
        let costs = WorkerRam {
            hack: 1.70,
            grow: 1.75,
            weaken: 1.75,
            share: 4.0,
        };
        let ram = ram_for(95, 20, 6, &costs);
        assert!((ram - 207.0).abs() < 1e-9);
    }
}
