//! Shared observation types.

use std::fmt;
use std::str::FromStr;

use crate::registry::HostId;

/// Worker script filenames, seeded onto every runner.
pub mod scripts {
    pub const HACK: &str = "worker-hack.js";
    pub const GROW: &str = "worker-grow.js";
    pub const WEAKEN: &str = "worker-weaken.js";
    pub const SHARE: &str = "worker-share.js";

    pub const ALL: [&str; 4] = [HACK, GROW, WEAKEN, SHARE];
}

/// The kind of work a worker process performs.
///
/// `Share` is pure filler: it earns nothing, holds RAM, and may be killed
/// at any time to make room for real work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    Hack,
    Grow,
    Weaken,
    Share,
}

impl WorkerKind {
    pub fn script(self) -> &'static str {
        match self {
            WorkerKind::Hack => scripts::HACK,
            WorkerKind::Grow => scripts::GROW,
            WorkerKind::Weaken => scripts::WEAKEN,
            WorkerKind::Share => scripts::SHARE,
        }
    }

    /// Inverse of `script`; `None` for filenames we do not manage.
    pub fn from_script(filename: &str) -> Option<Self> {
        match filename {
            scripts::HACK => Some(WorkerKind::Hack),
            scripts::GROW => Some(WorkerKind::Grow),
            scripts::WEAKEN => Some(WorkerKind::Weaken),
            scripts::SHARE => Some(WorkerKind::Share),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerKind::Hack => "hack",
            WorkerKind::Grow => "grow",
            WorkerKind::Weaken => "weaken",
            WorkerKind::Share => "share",
        };
        f.write_str(s)
    }
}

impl FromStr for WorkerKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hack" => Ok(WorkerKind::Hack),
            "grow" => Ok(WorkerKind::Grow),
            "weaken" => Ok(WorkerKind::Weaken),
            "share" => Ok(WorkerKind::Share),
            other => Err(anyhow::anyhow!("invalid worker kind: {}", other)),
        }
    }
}

/// Per-thread RAM cost (GB) of each worker script, measured at startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerRam {
    pub hack: f64,
    pub grow: f64,
    pub weaken: f64,
    pub share: f64,
}

impl WorkerRam {
    pub fn cost(&self, kind: WorkerKind) -> f64 {
        match kind {
            WorkerKind::Hack => self.hack,
            WorkerKind::Grow => self.grow,
            WorkerKind::Weaken => self.weaken,
            WorkerKind::Share => self.share,
        }
    }

    /// The three batch kinds must have a positive cost before any plan is
    /// allowed; a zero means introspection failed.
    pub fn batch_kinds_known(&self) -> bool {
        self.hack > 0.0 && self.grow > 0.0 && self.weaken > 0.0
    }
}

/// Everything observable about one server in a single probe.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    pub hostname: String,
    pub rooted: bool,
    pub max_ram: f64,
    pub used_ram: f64,
    pub cores: u32,
    pub max_money: f64,
    pub money: f64,
    pub security: f64,
    pub min_security: f64,
    pub growth: f64,
    pub required_level: u32,
    pub backdoored: bool,
}

/// Live view of a hackable host, as the planner sees it.
#[derive(Debug, Clone, Copy)]
pub struct TargetSnapshot {
    pub host: HostId,
    pub max_money: f64,
    pub money: f64,
    pub security: f64,
    pub min_security: f64,
    pub growth: f64,
    pub required_level: u32,
    pub backdoored: bool,
}

impl TargetSnapshot {
    pub fn from_info(host: HostId, info: &ServerInfo) -> Self {
        Self {
            host,
            max_money: info.max_money,
            money: info.money,
            security: info.security,
            min_security: info.min_security,
            growth: info.growth,
            required_level: info.required_level,
            backdoored: info.backdoored,
        }
    }

    /// Security points above the server minimum.
    pub fn excess_security(&self) -> f64 {
        (self.security - self.min_security).max(0.0)
    }
}

/// Live view of a host that contributes schedulable RAM.
#[derive(Debug, Clone, Copy)]
pub struct RunnerSnapshot {
    pub host: HostId,
    pub max_ram: f64,
    pub used_ram: f64,
    pub cores: u32,
}

impl RunnerSnapshot {
    pub fn free_ram(&self) -> f64 {
        (self.max_ram - self.used_ram).max(0.0)
    }
}

/// One running process, as reported by `HostControl::ps`.
///
/// Worker processes carry positional args `(target, delay_ms[, tag])`.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
    pub filename: String,
    pub pid: u32,
    pub threads: u32,
    pub args: Vec<String>,
}

impl ProcessInfo {
    /// Target hostname argument, when this is one of our workers.
    pub fn target_arg(&self) -> Option<&str> {
        WorkerKind::from_script(&self.filename)?;
        self.args.first().map(String::as_str)
    }
}

/// The player stats the hacking model depends on.
#[derive(Debug, Clone, Copy)]
pub struct PlayerSnapshot {
    pub hacking: u32,
}
