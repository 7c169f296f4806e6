//! Dream Shatter - deterministic core of a tension-driven corruption game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (seeded content, tension, difficulty, boss, director)
//! - `settings`: Run-level tunables that are not derived from the seed
//!
//! Rendering, audio, haptics and input devices live outside this crate and
//! talk to it through [`sim::DreamRun`].

pub mod settings;
pub mod sim;

pub use settings::{BossTimings, Settings};
pub use sim::{Dream, DreamRun, SimEvent, TickInput};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep used by the headless driver (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Upper bound of tension; reaching it shatters the run
    pub const MAX_TENSION: f32 = 0.999;

    /// One-time decrease granted when every required key is held
    pub const COHERENCE_BONUS: f32 = 0.09;
    /// Tension penalty applied when an echo first spawns for a key
    pub const ECHO_PENALTY: f32 = 0.035;
    /// Echo lifetime (milliseconds)
    pub const ECHO_TTL_MS: f64 = 1800.0;
    /// Tension added per remote "shared corruption" tick
    pub const REMOTE_CORRUPTION: f32 = 0.01;

    /// Consecutive misses that force a boss encounter
    pub const MISSES_FOR_BOSS: u32 = 3;
    /// Tension forced on entering the Impact phase
    pub const BOSS_IMPACT_TENSION: f32 = 0.98;
    /// Health removed per tick of held grip during Resolve (scaled by grip)
    pub const BOSS_GRIP_DAMAGE: f32 = 0.012;
    /// Health removed per discrete counter pulse (boss-first archetype)
    pub const BOSS_PULSE_DAMAGE: f32 = 0.008;
    /// Remaining health at or below which a Resolve counts as a partial success
    pub const BOSS_PARTIAL_HEALTH: f32 = 0.3;
    /// Starting boss health (boss-first archetype uses its own, higher value)
    pub const BOSS_BASE_HEALTH: f32 = 1.0;

    /// Highest tension the director may propose
    pub const DIRECTOR_MAX_PROPOSAL: f32 = 0.95;
    /// Rolling action window used for the skill estimate (seconds)
    pub const DIRECTOR_WINDOW_SECS: f64 = 5.0;
}

/// Normalized angle to [-π, π)
#[inline]
pub fn normalize_angle(mut angle: f32) -> f32 {
    use std::f32::consts::PI;
    if !angle.is_finite() {
        return 0.0;
    }
    while angle >= PI {
        angle -= 2.0 * PI;
    }
    while angle < -PI {
        angle += 2.0 * PI;
    }
    angle
}

/// Convert polar (r, theta) to cartesian (x, y)
#[inline]
pub fn polar_to_cartesian(r: f32, theta: f32) -> Vec2 {
    Vec2::new(r * theta.cos(), r * theta.sin())
}

/// Convert cartesian (x, y) to polar (r, theta)
#[inline]
pub fn cartesian_to_polar(pos: Vec2) -> (f32, f32) {
    (pos.length(), pos.y.atan2(pos.x))
}

/// Clamp a value to `[lo, hi]`, mapping NaN to `lo`. A NaN or inverted `hi`
/// collapses the range to `lo`.
#[inline]
pub fn sanitize(value: f32, lo: f32, hi: f32) -> f32 {
    let hi = if hi >= lo { hi } else { lo };
    if value.is_nan() {
        lo
    } else {
        value.max(lo).min(hi)
    }
}
