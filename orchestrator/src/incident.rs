//! Incident ring.
//!
//! Diagnostic records only. The scheduler never consults this; it exists
//! so a human reading the log can reconstruct what went sideways.

use std::collections::VecDeque;

use fleet::WorkerKind;
use tracing::warn;
use uuid::Uuid;

/// Bounded capacity of the ring; older records fall off the front.
const INCIDENT_CAP: usize = 20;

#[derive(Debug, Clone)]
pub enum Incident {
    /// Post-batch money landed below the over-hack floor.
    OverHack {
        target: String,
        money: f64,
        pre_money: f64,
        hack_threads: u32,
        weaken_threads: u32,
        /// `weaken_time − (hack_delay + hack_time)`; negative means the
        /// hack landed after its counter-weaken.
        margin_ms: i64,
        backdoored: bool,
    },
    /// A batch launched fewer threads than planned.
    PartialDispatch {
        target: String,
        batch_id: Uuid,
        kind: WorkerKind,
        planned: u32,
        launched: u32,
    },
    /// Live worker threads found where the tracker believed idle.
    Overlap {
        target: String,
        hack: u32,
        grow: u32,
        weaken: u32,
    },
    /// A grow plan beyond the excessive-thread threshold.
    LargeGrow { target: String, grow_threads: u32 },
    /// No runner offered any free RAM this tick.
    NoRunner,
}

#[derive(Debug, Clone)]
pub struct IncidentRecord {
    /// Wall-clock timestamp, for humans reading the ring.
    pub at_wall_ms: i64,
    pub incident: Incident,
}

/// Append-only bounded ring of incident records.
#[derive(Debug, Default)]
pub struct IncidentLog {
    ring: VecDeque<IncidentRecord>,
}

impl IncidentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, incident: Incident) {
        match &incident {
            Incident::OverHack {
                target,
                money,
                pre_money,
                hack_threads,
                weaken_threads,
                margin_ms,
                backdoored,
            } => warn!(
                target_host = %target,
                money,
                pre_money,
                hack_threads,
                weaken_threads,
                margin_ms,
                backdoored,
                "over-hack: post-batch money below floor"
            ),
            Incident::PartialDispatch {
                target,
                batch_id,
                kind,
                planned,
                launched,
            } => warn!(
                target_host = %target,
                %batch_id,
                kind = %kind,
                planned,
                launched,
                "partial dispatch: fewer threads launched than planned"
            ),
            Incident::Overlap {
                target,
                hack,
                grow,
                weaken,
            } => warn!(
                target_host = %target,
                hack,
                grow,
                weaken,
                "overlap: live workers on a target tracked as idle"
            ),
            Incident::LargeGrow {
                target,
                grow_threads,
            } => warn!(
                target_host = %target,
                grow_threads,
                "excessive grow plan; dispatching anyway"
            ),
            Incident::NoRunner => warn!("no runner with free RAM this tick"),
        }

        if self.ring.len() == INCIDENT_CAP {
            self.ring.pop_front();
        }
        self.ring.push_back(IncidentRecord {
            at_wall_ms: common::time::wall_ms(),
            incident,
        });
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IncidentRecord> {
        self.ring.iter()
    }
}
