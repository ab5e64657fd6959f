//! Host-control interface.
//!
//! This trait intentionally hides how the game world is reached (in
//! process, RPC, savefile replay). Implementations must be cheap to call
//! once per host per tick.

use async_trait::async_trait;

use crate::types::{PlayerSnapshot, ProcessInfo, ServerInfo};

/// Everything the orchestrator may do to the world.
///
/// Launch semantics: `exec` starts `threads` copies of `script` on `host`
/// with positional `args` and returns the pid, or 0 when the host refused
/// (insufficient RAM, missing file). Launches are never awaited; the
/// orchestrator observes completions through `ps` on later ticks.
#[async_trait]
pub trait HostControl: Send + Sync {
    /// Hostnames directly reachable from `host`.
    async fn scan(&self, host: &str) -> Vec<String>;

    /// Attempt to gain root. Returns the resulting root state.
    async fn try_root(&self, host: &str) -> bool;

    async fn has_root(&self, host: &str) -> bool;

    /// Copy `files` from the orchestrator's home host onto `dest`.
    async fn scp(&self, files: &[&str], dest: &str) -> anyhow::Result<()>;

    /// Live process list for `host`.
    async fn ps(&self, host: &str) -> Vec<ProcessInfo>;

    /// Launch a script; 0 means the launch failed.
    async fn exec(&self, script: &str, host: &str, threads: u32, args: &[String]) -> u32;

    /// Kill a process by pid. Returns whether anything died.
    async fn kill(&self, pid: u32, host: &str) -> bool;

    /// One consolidated probe of a server's static and live fields.
    /// `None` when the host does not exist.
    async fn survey(&self, host: &str) -> Option<ServerInfo>;

    /// Per-thread RAM cost of `script` in GB; 0.0 when unknown.
    async fn script_ram(&self, script: &str) -> f64;

    async fn player(&self) -> PlayerSnapshot;

    /// Publish an artifact under a well-known key for peer services.
    async fn write_data(&self, key: &str, contents: &str) -> anyhow::Result<()>;
}
