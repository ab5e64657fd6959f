//! Hacking model interface.
//!
//! The orchestrator never invents numbers: run times, steal fractions,
//! success chance and growth factors all come from a `HackingModel`.
//! `FormulaModel` implements the game's published closed forms with
//! neutral (1.0) player multipliers.

use crate::types::{PlayerSnapshot, TargetSnapshot};

/// Read-only oracle for worker timings and effects.
///
/// All times are integer milliseconds; fractions are in `[0, 1]`.
pub trait HackingModel: Send + Sync {
    fn hack_time_ms(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> u64;
    fn grow_time_ms(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> u64;
    fn weaken_time_ms(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> u64;

    /// Fraction of current money one hack thread steals on success.
    fn hack_percent(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> f64;

    /// Probability a hack process succeeds.
    fn hack_chance(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> f64;

    /// Money multiplier of `threads` grow threads (≥ 1).
    fn grow_percent(
        &self,
        target: &TargetSnapshot,
        threads: u32,
        player: &PlayerSnapshot,
        cores: u32,
    ) -> f64;

    /// Closed-form thread count to grow current money up to `target_money`.
    ///
    /// Models without this capability return `None`; the planner then
    /// falls back to searching `grow_percent`.
    fn grow_threads(
        &self,
        _target: &TargetSnapshot,
        _player: &PlayerSnapshot,
        _target_money: f64,
        _cores: u32,
    ) -> Option<u32> {
        None
    }

    /// Security removed by one weaken thread on a `cores`-core runner.
    fn weaken_per_thread(&self, cores: u32) -> f64 {
        WEAKEN_BASE * core_bonus(cores)
    }
}

/// Base security reduction of one weaken thread.
pub const WEAKEN_BASE: f64 = 0.05;

/// Security added per hack thread.
pub const SEC_PER_HACK: f64 = 0.002;

/// Security added per grow thread.
pub const SEC_PER_GROW: f64 = 0.004;

fn core_bonus(cores: u32) -> f64 {
    1.0 + (cores.saturating_sub(1) as f64) / 16.0
}

/// The game's closed-form hacking formulas.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaModel;

impl FormulaModel {
    /// Shared time scaling: higher security and level requirements slow
    /// every operation; player skill speeds them up.
    fn skill_factor(target: &TargetSnapshot, player: &PlayerSnapshot) -> f64 {
        let difficulty = target.required_level as f64 * target.security;
        (2.5 * difficulty + 500.0) / (player.hacking as f64 + 50.0)
    }

    /// Growth rate per thread, capped so low-security servers do not
    /// compound absurdly.
    fn adjusted_growth_rate(security: f64) -> f64 {
        (1.0 + 0.03 / security.max(1.0)).min(1.0035)
    }
}

impl HackingModel for FormulaModel {
    fn hack_time_ms(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> u64 {
        (5_000.0 * Self::skill_factor(target, player)).round() as u64
    }

    fn grow_time_ms(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> u64 {
        (self.hack_time_ms(target, player) as f64 * 3.2).round() as u64
    }

    fn weaken_time_ms(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> u64 {
        self.hack_time_ms(target, player) * 4
    }

    fn hack_percent(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> f64 {
        if target.security >= 100.0 {
            return 0.0;
        }
        let level = player.hacking as f64;
        let difficulty_mult = (100.0 - target.security) / 100.0;
        let skill_mult = (level - (target.required_level as f64 - 1.0)) / level;
        (difficulty_mult * skill_mult / 240.0).clamp(0.0, 1.0)
    }

    fn hack_chance(&self, target: &TargetSnapshot, player: &PlayerSnapshot) -> f64 {
        if target.security >= 100.0 {
            return 0.0;
        }
        let skill_mult = 1.75 * player.hacking as f64;
        let skill_chance = (skill_mult - target.required_level as f64) / skill_mult;
        let difficulty_mult = (100.0 - target.security) / 100.0;
        (skill_chance * difficulty_mult).clamp(0.0, 1.0)
    }

    fn grow_percent(
        &self,
        target: &TargetSnapshot,
        threads: u32,
        _player: &PlayerSnapshot,
        cores: u32,
    ) -> f64 {
        let rate = Self::adjusted_growth_rate(target.security);
        let exponent = threads as f64 * (target.growth / 100.0) * core_bonus(cores);
        rate.powf(exponent)
    }

    fn grow_threads(
        &self,
        target: &TargetSnapshot,
        _player: &PlayerSnapshot,
        target_money: f64,
        cores: u32,
    ) -> Option<u32> {
        if target.money >= target_money {
            return Some(0);
        }
        let rate = Self::adjusted_growth_rate(target.security);
        let per_thread = rate.ln() * (target.growth / 100.0) * core_bonus(cores);
        if per_thread <= 0.0 {
            return None;
        }
        let needed = (target_money / target.money.max(1.0)).ln() / per_thread;
        Some(needed.ceil() as u32)
    }
}
