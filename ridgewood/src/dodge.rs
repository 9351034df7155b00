//! Soul-dodge arena in logical 800x600 units, y pointing down.

use std::f64::consts::TAU;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::rules::{unit, MAX_PROJECTILES};
use crate::state::Direction;

pub const SCREEN_W: f64 = 800.0;
pub const SCREEN_H: f64 = 600.0;

pub const ARENA_LEFT: f64 = 170.0;
pub const ARENA_RIGHT: f64 = 630.0;
pub const ARENA_TOP: f64 = 170.0;
pub const ARENA_BOTTOM: f64 = 390.0;

pub const SOUL_REST: (f64, f64) = (400.0, 340.0);
pub const SOUL_RADIUS: f64 = 8.0;
pub const SOUL_SPEED: f64 = 6.0;
pub const INPUT_HOLD_FRAMES: u8 = 6;
pub const EASE: f64 = 0.08;

pub const PROJECTILE_RADIUS: f64 = 6.0;
pub const RING_RADIUS: f64 = 150.0;
pub const FIELD_ITEM_RADIUS: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Tint {
    Red,
    White,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Projectile {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
    pub tint: Tint,
    pub alive: bool,
}

impl Projectile {
    fn off_screen(&self) -> bool {
        self.x < -self.radius
            || self.x > SCREEN_W + self.radius
            || self.y < -self.radius
            || self.y > SCREEN_H + self.radius
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Soul {
    pub x: f64,
    pub y: f64,
    pub heading: Option<Direction>,
    pub hold: u8,
}

impl Default for Soul {
    fn default() -> Self {
        Self {
            x: SOUL_REST.0,
            y: SOUL_REST.1,
            heading: None,
            hold: 0,
        }
    }
}

impl Soul {
    pub fn nudge(&mut self, direction: Direction) {
        self.heading = Some(direction);
        self.hold = INPUT_HOLD_FRAMES;
    }

    /// Moves along the held heading, then clamps into the arena.
    pub fn step(&mut self) {
        if let Some(direction) = self.heading {
            match direction {
                Direction::Up => self.y -= SOUL_SPEED,
                Direction::Down => self.y += SOUL_SPEED,
                Direction::Left => self.x -= SOUL_SPEED,
                Direction::Right => self.x += SOUL_SPEED,
            }
            self.hold = self.hold.saturating_sub(1);
            if self.hold == 0 {
                self.heading = None;
            }
        }
        let (x, y) = clamp_to_arena(self.x, self.y, SOUL_RADIUS);
        self.x = x;
        self.y = y;
    }

    pub fn ease_to_rest(&mut self) {
        self.heading = None;
        self.hold = 0;
        self.x += (SOUL_REST.0 - self.x) * EASE;
        self.y += (SOUL_REST.1 - self.y) * EASE;
        if (self.x - SOUL_REST.0).abs() < 0.5 && (self.y - SOUL_REST.1).abs() < 0.5 {
            self.x = SOUL_REST.0;
            self.y = SOUL_REST.1;
        }
    }

    pub fn touches(&self, x: f64, y: f64, radius: f64) -> bool {
        touching(self.x, self.y, SOUL_RADIUS, x, y, radius)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FieldItem {
    pub item_id: String,
    pub x: f64,
    pub y: f64,
}

impl FieldItem {
    pub fn spawn(seed: &mut u64, item_id: &str) -> Self {
        let margin = FIELD_ITEM_RADIUS * 2.0;
        let x = ARENA_LEFT + margin + unit(seed) * (ARENA_RIGHT - ARENA_LEFT - margin * 2.0);
        let y = ARENA_TOP + margin + unit(seed) * (ARENA_BOTTOM - ARENA_TOP - margin * 2.0);
        Self {
            item_id: item_id.to_string(),
            x,
            y,
        }
    }
}

pub fn touching(ax: f64, ay: f64, ar: f64, bx: f64, by: f64, br: f64) -> bool {
    let dx = ax - bx;
    let dy = ay - by;
    let reach = ar + br;
    dx * dx + dy * dy < reach * reach
}

pub fn clamp_to_arena(x: f64, y: f64, radius: f64) -> (f64, f64) {
    let x = if x.is_finite() { x } else { SOUL_REST.0 };
    let y = if y.is_finite() { y } else { SOUL_REST.1 };
    (
        x.clamp(ARENA_LEFT + radius, ARENA_RIGHT - radius),
        y.clamp(ARENA_TOP + radius, ARENA_BOTTOM - radius),
    )
}

/// Ring of red projectiles around `center`, each aimed inward with a little jitter.
pub fn spawn_ring(seed: &mut u64, center: (f64, f64), count: usize, speed: f64) -> Vec<Projectile> {
    let count = count.min(MAX_PROJECTILES);
    (0..count)
        .map(|_| {
            let angle = unit(seed) * TAU;
            let x = center.0 + angle.cos() * RING_RADIUS;
            let y = center.1 + angle.sin() * RING_RADIUS;
            let aim = (center.1 - y).atan2(center.0 - x) + (unit(seed) - 0.5) * 0.4;
            Projectile {
                x,
                y,
                vx: aim.cos() * speed,
                vy: aim.sin() * speed,
                radius: PROJECTILE_RADIUS,
                tint: Tint::Red,
                alive: true,
            }
        })
        .collect()
}

/// White pellet dropping from the top of the arena during a strike.
pub fn spawn_falling(seed: &mut u64) -> Projectile {
    let span = ARENA_RIGHT - ARENA_LEFT - PROJECTILE_RADIUS * 2.0;
    let x = ARENA_LEFT + PROJECTILE_RADIUS + unit(seed) * span;
    Projectile {
        x,
        y: ARENA_TOP,
        vx: 0.0,
        vy: 4.0 + unit(seed) * 2.0,
        radius: PROJECTILE_RADIUS,
        tint: Tint::White,
        alive: true,
    }
}

pub fn advance(projectiles: &mut [Projectile]) {
    for projectile in projectiles.iter_mut().filter(|p| p.alive) {
        projectile.x += projectile.vx;
        projectile.y += projectile.vy;
        if projectile.off_screen() {
            projectile.alive = false;
        }
    }
}

/// Marks every live projectile touching the soul as spent and returns how many there were.
pub fn collect_hits(projectiles: &mut [Projectile], soul: &Soul) -> u32 {
    let mut hits = 0;
    for projectile in projectiles.iter_mut().filter(|p| p.alive) {
        if soul.touches(projectile.x, projectile.y, projectile.radius) {
            projectile.alive = false;
            hits += 1;
        }
    }
    hits
}

pub fn prune(projectiles: &mut Vec<Projectile>) {
    projectiles.retain(|p| p.alive);
}
