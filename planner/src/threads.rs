//! Thread-count arithmetic.
//!
//! Closed-form where the model exposes one, bounded search otherwise.
//! Every function returns `None` instead of panicking when an input the
//! formula needs is undefined; the caller retries next tick.

use fleet::{HackingModel, PlayerSnapshot, TargetSnapshot};
use tracing::debug;

use crate::tuning::Tuning;

/// Search ceiling for the grow fallback; a target needing more than this
/// many threads is beyond any fleet we schedule for.
const GROW_SEARCH_CAP: u32 = 1 << 22;

/// Weaken threads needed to remove `excess_security` at
/// `weaken_per_thread` reduction each.
pub fn weaken_to_min(excess_security: f64, weaken_per_thread: f64) -> Option<u32> {
    if weaken_per_thread <= 0.0 {
        return None;
    }
    if excess_security <= 0.0 {
        return Some(0);
    }
    Some((excess_security / weaken_per_thread).ceil() as u32)
}

/// Weaken threads countering a batch's own security growth plus any
/// pre-existing drift, in one wave.
pub fn counter_weaken(
    hack_threads: u32,
    grow_threads: u32,
    excess_security: f64,
    tuning: &Tuning,
) -> u32 {
    let added = hack_threads as f64 * tuning.sec_per_hack
        + grow_threads as f64 * tuning.sec_per_grow
        + excess_security.max(0.0);
    if added <= 0.0 {
        return 0;
    }
    (added / tuning.sec_per_weaken).ceil() as u32
}

/// Hack threads to bring `money_at_hack` down to the money floor.
///
/// `money_at_hack` is the money level when the hack lands: current money
/// for a plain hack wave, `max_money` when a grow lands first. With an
/// unreliable hack chance the count is inflated to cover expected
/// failures.
pub fn hack_to_floor(
    money_at_hack: f64,
    max_money: f64,
    hack_percent: f64,
    hack_chance: f64,
    tuning: &Tuning,
) -> Option<u32> {
    if hack_percent <= 0.0 || money_at_hack <= 0.0 {
        return None;
    }
    let surplus = money_at_hack - tuning.money_floor * max_money;
    if surplus <= 0.0 {
        return Some(0);
    }
    let base = (surplus / (hack_percent * money_at_hack)).ceil();
    if hack_chance >= tuning.reliable_hack_chance {
        return Some(base as u32);
    }
    if hack_chance <= 0.0 {
        return None;
    }
    Some((base / hack_chance).ceil() as u32)
}

/// Grow threads to bring the target's money back to `max_money`,
/// overbooked by the safety factor.
///
/// Uses the model's closed form when present and enabled; otherwise a
/// doubling-then-binary search over `grow_percent` for the first thread
/// count whose multiplier covers the deficit.
pub fn grow_to_full<M: HackingModel>(
    model: &M,
    target: &TargetSnapshot,
    player: &PlayerSnapshot,
    cores: u32,
    closed_form: bool,
    tuning: &Tuning,
) -> Option<u32> {
    if target.max_money <= 0.0 {
        return None;
    }
    if target.money >= target.max_money {
        return Some(0);
    }

    let raw = if closed_form {
        match model.grow_threads(target, player, target.max_money, cores) {
            Some(n) => n,
            None => search_grow_threads(model, target, player, cores)?,
        }
    } else {
        search_grow_threads(model, target, player, cores)?
    };

    if raw == 0 {
        return Some(0);
    }
    Some((raw as f64 * tuning.grow_overbook).ceil() as u32)
}

fn search_grow_threads<M: HackingModel>(
    model: &M,
    target: &TargetSnapshot,
    player: &PlayerSnapshot,
    cores: u32,
) -> Option<u32> {
    let ratio = target.max_money / target.money.max(1.0);
    if ratio <= 1.0 {
        return Some(0);
    }

    // Grow the bracket until the multiplier covers the deficit.
    let mut hi = 1u32;
    while model.grow_percent(target, hi, player, cores) < ratio {
        if hi >= GROW_SEARCH_CAP {
            debug!(
                target_host = %target.host,
                ratio,
                "grow search capped; no finite thread count reaches full"
            );
            return None;
        }
        hi = hi.saturating_mul(2).min(GROW_SEARCH_CAP);
    }

    // First n in (hi/2, hi] with grow_percent(n) >= ratio.
    let mut lo = hi / 2;
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if model.grow_percent(target, mid, player, cores) >= ratio {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some(hi)
}
