//! Analog lever/pressure mechanics for the archetypes that have one
//!
//! Rotating-reach: a target ring spins at `rotation_rpm`; the lever must point
//! at it. Resistance-matching: grip pressure must track an oscillating target
//! resistance. A match yields a grip strength for continuous stabilization.

use std::f32::consts::{PI, TAU};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::dream::{Archetype, ResistanceMatching, RotatingReach};
use crate::{cartesian_to_polar, normalize_angle, sanitize};

/// Lever magnitude below which the stick counts as centered
pub const LEVER_DEADZONE: f32 = 0.5;

/// Raw analog state from the input collaborator
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalogInput {
    /// Lever/arrow position, unit disc
    pub lever: Vec2,
    /// Grip pressure, 0-1
    pub pressure: f32,
}

/// Ring angle at `time_secs` (radians, [-π, π))
pub fn ring_angle(reach: &RotatingReach, time_secs: f32) -> f32 {
    normalize_angle(reach.rotation_rpm / 60.0 * TAU * time_secs)
}

/// Grip strength if the lever points at the ring
pub fn evaluate_reach(reach: &RotatingReach, time_secs: f32, lever: Vec2) -> Option<f32> {
    let (magnitude, theta) = cartesian_to_polar(lever);
    if !magnitude.is_finite() || magnitude < LEVER_DEADZONE {
        return None;
    }
    let delta = normalize_angle(theta - ring_angle(reach, time_secs)).abs();
    let window = reach.reach_tolerance * PI;
    (delta <= window).then(|| sanitize(magnitude, 0.0, 1.0) * (1.0 - delta / window.max(f32::EPSILON) * 0.5))
}

/// Target resistance at `time_secs`, 0-1
pub fn target_resistance(res: &ResistanceMatching, time_secs: f32) -> f32 {
    let period = res.slit_period.max(0.1);
    0.5 + 0.5 * (TAU * time_secs / period).sin()
}

/// Grip strength if pressure matches the target resistance
pub fn evaluate_resistance(res: &ResistanceMatching, time_secs: f32, pressure: f32) -> Option<f32> {
    let pressure = sanitize(pressure, 0.0, 1.0);
    let error = (pressure - target_resistance(res, time_secs)).abs();
    (error <= res.tolerance).then(|| 1.0 - error / res.tolerance.max(f32::EPSILON) * 0.5)
}

/// Dispatch on the live archetype; archetypes without an analog channel return None
pub fn evaluate(archetype: &Archetype, time_secs: f32, input: &AnalogInput) -> Option<f32> {
    match archetype {
        Archetype::RotatingReach(r) => evaluate_reach(r, time_secs, input.lever),
        Archetype::ResistanceMatching(r) => evaluate_resistance(r, time_secs, input.pressure),
        Archetype::OrderedSequence(_) | Archetype::BossFirst(_) => None,
    }
}
