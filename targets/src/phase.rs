use std::fmt;
use std::str::FromStr;

/// Where a target sits in the prep/income loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Security above tolerance, no prep dispatched yet.
    #[default]
    Unprepped,
    /// A prep weaken wave is in flight.
    Prepping,
    /// Prepped and idle; the planner may act on it.
    Ready,
    /// Hack + counter-weaken in flight.
    HwInflight,
    /// Grow + counter-weaken in flight.
    GwInflight,
    /// Combined grow + hack + weaken in flight.
    GhwInflight,
    /// Recovery saw only weaken workers on a drained target.
    WeakenAfterHack,
    /// Recovery saw only weaken workers on a grown target.
    WeakenAfterGrow,
}

impl Phase {
    /// Any phase with a batch whose completion we are waiting on.
    pub fn is_inflight(self) -> bool {
        !matches!(self, Phase::Unprepped | Phase::Ready)
    }

    /// Phases whose in-flight batch included hack threads, and which are
    /// therefore subject to the over-hack check on completion.
    pub fn hack_in_flight(self) -> bool {
        matches!(
            self,
            Phase::HwInflight | Phase::GhwInflight | Phase::WeakenAfterHack
        )
    }

    /// Phases that count as prep work for fleet statistics.
    pub fn is_prep(self) -> bool {
        matches!(self, Phase::Unprepped | Phase::Prepping)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Unprepped => "unprepped",
            Phase::Prepping => "prepping",
            Phase::Ready => "ready",
            Phase::HwInflight => "hw-inflight",
            Phase::GwInflight => "gw-inflight",
            Phase::GhwInflight => "ghw-inflight",
            Phase::WeakenAfterHack => "weaken-after-hack",
            Phase::WeakenAfterGrow => "weaken-after-grow",
        };
        f.write_str(s)
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprepped" => Ok(Phase::Unprepped),
            "prepping" => Ok(Phase::Prepping),
            "ready" => Ok(Phase::Ready),
            "hw-inflight" => Ok(Phase::HwInflight),
            "gw-inflight" => Ok(Phase::GwInflight),
            "ghw-inflight" => Ok(Phase::GhwInflight),
            "weaken-after-hack" => Ok(Phase::WeakenAfterHack),
            "weaken-after-grow" => Ok(Phase::WeakenAfterGrow),
            other => Err(anyhow::anyhow!("invalid phase: {}", other)),
        }
    }
}
