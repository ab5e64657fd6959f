//! Target scoring and admission.
//
//  This module is deliberately pure: no async, no IO.

use fleet::{PlayerSnapshot, ServerInfo};

use crate::config::OrchestratorConfig;

/// Why a server is not worth hacking right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    NoRoot,
    NoMoney,
    LevelTooHigh,
    Blacklisted,
    GrowthTooLow,
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Check whether a server qualifies as a hacking target at all.
///
/// Unrooted servers are skipped silently; they may become eligible after
/// a later root attempt succeeds.
pub fn check_target_eligibility(
    info: &ServerInfo,
    player: &PlayerSnapshot,
    cfg: &OrchestratorConfig,
) -> Eligibility {
    if !info.rooted {
        return Eligibility::NoRoot;
    }
    if info.max_money <= 0.0 {
        return Eligibility::NoMoney;
    }
    if info.required_level > player.hacking {
        return Eligibility::LevelTooHigh;
    }
    if cfg.blacklist.iter().any(|b| b == &info.hostname) {
        return Eligibility::Blacklisted;
    }
    if info.growth < cfg.min_growth {
        return Eligibility::GrowthTooLow;
    }
    Eligibility::Eligible
}

/// Profit score: money throughput favored, hardened servers penalized.
pub fn profit_score(max_money: f64, hack_chance: f64, min_security: f64) -> f64 {
    max_money * hack_chance / (min_security + 1.0)
}
