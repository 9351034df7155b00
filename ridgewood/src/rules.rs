use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const MAX_HITS: u32 = 6;
pub const MAX_PROJECTILES: usize = 18;
pub const MIN_STRIKE_DAMAGE: i32 = 2;
pub const MIN_BASE_ROLL: i32 = 3;
pub const MOOD_TO_SPARE: i32 = 3;
pub const VICTORY_HEAL: i32 = 4;
pub const LEVEL_HP_GAIN: i32 = 4;

/// Upper bounds a loaded save or encounter table is clamped into.
pub const MAX_LEVEL: u32 = 99;
pub const MAX_HP_CAP: i32 = 9999;
pub const MAX_STAT: i32 = 999;
pub const MAX_MOOD: i32 = 99;
pub const MAX_EXP_REWARD: u32 = 9999;

/// How the run ended, decided from the kill/mercy tallies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Route {
    Genocide,
    Pacifist,
    Neutral,
}

impl Route {
    pub fn label(self) -> &'static str {
        match self {
            Route::Genocide => "Genocide",
            Route::Pacifist => "Pacifist",
            Route::Neutral => "Neutral",
        }
    }
}

pub fn select_route(kills: u32, mercies: u32, total: usize) -> Route {
    let total = total as u32;
    if kills >= total {
        Route::Genocide
    } else if kills == 0 && mercies >= total {
        Route::Pacifist
    } else {
        Route::Neutral
    }
}

pub fn next_u32(seed: &mut u64) -> u32 {
    *seed = seed
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*seed >> 32) as u32
}

/// Inclusive roll in `lo..=hi`.
pub fn roll(seed: &mut u64, lo: i32, hi: i32) -> i32 {
    if hi <= lo {
        return lo;
    }
    let span = (hi - lo + 1) as u32;
    lo + (next_u32(seed) % span) as i32
}

/// Uniform float in `[0, 1)`.
pub fn unit(seed: &mut u64) -> f64 {
    next_u32(seed) as f64 / (u32::MAX as f64 + 1.0)
}

pub fn chance(seed: &mut u64, percent: u32) -> bool {
    next_u32(seed) % 100 < percent
}

/// Rolled once when the strike window opens.
pub fn strike_base_roll(seed: &mut u64, defense: i32) -> i32 {
    roll(seed, 0, 17)
        .saturating_add(6)
        .saturating_sub(defense)
        .max(MIN_BASE_ROLL)
}

/// Every projectile that reached the soul during the window takes a point off the strike.
pub fn strike_damage(base_roll: i32, misses: u32) -> i32 {
    let misses = misses.min(MAX_HITS) as i32;
    base_roll.saturating_sub(misses).max(MIN_STRIKE_DAMAGE)
}

pub fn projectile_count(attack: i32) -> usize {
    ((attack.max(0) / 2 + 6) as usize).min(MAX_PROJECTILES)
}

/// Logical units per frame.
pub fn projectile_speed(attack: i32) -> f64 {
    3.0 + attack.max(0) as f64 * 0.2
}

pub fn counter_window_ms(seed: &mut u64) -> u64 {
    1600 + roll(seed, 0, 800) as u64
}

pub fn counter_damage(attack: i32, hits: u32, player_hp: i32) -> i32 {
    let hits = hits.min(MAX_HITS) as i64;
    if hits == 0 {
        return 0;
    }
    let damage = (attack.max(0) as i64 * hits / MAX_HITS as i64).max(1);
    damage.min(player_hp.max(0) as i64) as i32
}

/// Threshold boundary is inclusive: 17 of 80 at 0.22 spares, 18 does not.
pub fn within_mercy_threshold(hp: i32, max_hp: i32, threshold: f64) -> bool {
    hp as f64 <= threshold * max_hp as f64
}

/// Thresholds live in `[0, 1]`; anything not a number spares nobody.
pub fn clamp_threshold(threshold: f64) -> f64 {
    if threshold.is_finite() {
        threshold.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn exp_to_next(level: u32) -> u32 {
    level.max(1).saturating_mul(20)
}
