//! Difficulty scaler
//!
//! One scaling law drives every dynamic parameter:
//!
//! `scale = 1 + k * ln(1 + tension * time_scale * elapsed_ms)`
//!
//! Growing parameters become `min(ceiling, base * scale)`, shrinking ones
//! `max(floor, base / scale)`. Outputs are written back onto the dream once
//! per tick.

use serde::{Deserialize, Serialize};

use super::dream::{Archetype, Dream};
use super::seed::DifficultyConfig;
use crate::consts::MAX_TENSION;
use crate::sanitize;

/// Shared scaling law. Always `>= 1` and finite.
pub fn scale_factor(cfg: &DifficultyConfig, tension: f32, elapsed_ms: f64) -> f32 {
    let tension = f64::from(sanitize(tension, 0.0, MAX_TENSION));
    let elapsed = if elapsed_ms.is_finite() { elapsed_ms.max(0.0) } else { 0.0 };
    let x = tension * f64::from(cfg.time_scale) * elapsed;
    let scale = 1.0 + f64::from(cfg.k) * x.ln_1p();
    if scale.is_finite() {
        (scale as f32).max(1.0)
    } else {
        1.0
    }
}

/// `min(ceiling, base * scale)`
#[inline]
pub fn grow(base: f32, scale: f32, ceiling: f32) -> f32 {
    (base * scale).min(ceiling)
}

/// `max(floor, base / scale)`
#[inline]
pub fn shrink(base: f32, scale: f32, floor: f32) -> f32 {
    (base / scale).max(floor)
}

/// Damped feedback gain for the tension governor's increase rate
pub fn increase_modifier(cfg: &DifficultyConfig, scale: f32) -> f32 {
    let damping = cfg.damping_coeff.clamp(0.7, 0.9);
    (1.0 + (scale - 1.0) * damping).clamp(1.0, cfg.max_increase_modifier.max(1.0))
}

/// Result of one recompute, mirrored onto the dream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultySnapshot {
    pub scale: f32,
    pub phase_index: usize,
    pub spawn_interval_ms: f32,
    pub enemy_cap: u32,
    pub morph_speed: f32,
    pub boss_threshold: f32,
    pub pattern_complexity: u32,
    pub tension_increase_modifier: f32,
}

#[derive(Debug, Clone, Default)]
pub struct DifficultyScaler {
    last: Option<DifficultySnapshot>,
}

impl DifficultyScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<&DifficultySnapshot> {
        self.last.as_ref()
    }

    pub fn dispose(&mut self) {
        self.last = None;
    }

    /// Recompute every scaled parameter and write it onto `dream`
    pub fn update(&mut self, dream: &mut Dream, tension: f32, elapsed_ms: f64) -> DifficultySnapshot {
        let cfg = dream.difficulty;
        let scale = scale_factor(&cfg, tension, elapsed_ms);
        let phase_index = dream.phase_index_for(tension);
        let phase = &dream.phases[phase_index];

        let base_cap = phase.enemy_count.min(cfg.enemy_cap_ceiling);
        let snapshot = DifficultySnapshot {
            scale,
            phase_index,
            spawn_interval_ms: shrink(phase.spawn_interval_ms, scale, cfg.spawn_interval_floor_ms),
            enemy_cap: (grow(base_cap as f32, scale, cfg.enemy_cap_ceiling as f32).floor() as u32)
                .clamp(base_cap, cfg.enemy_cap_ceiling),
            morph_speed: grow(dream.base.morph_speed, scale, cfg.morph_speed_ceiling),
            boss_threshold: shrink(dream.base.boss_threshold, scale, cfg.boss_threshold_floor),
            pattern_complexity: ((1.0 + scale).floor() as u32).min(cfg.pattern_complexity_ceiling),
            tension_increase_modifier: increase_modifier(&cfg, scale),
        };

        dream.live.spawn_interval_ms = snapshot.spawn_interval_ms;
        dream.live.enemy_cap = snapshot.enemy_cap;
        dream.live.morph_speed = snapshot.morph_speed;
        dream.live.boss_threshold = snapshot.boss_threshold;
        dream.live.pattern_complexity = snapshot.pattern_complexity;
        dream.live.tension_increase_modifier = snapshot.tension_increase_modifier;

        match &mut dream.archetype {
            Archetype::RotatingReach(r) => {
                r.rotation_rpm = grow(r.base_rotation_rpm, scale, cfg.rotation_rpm_ceiling);
                r.reach_tolerance = shrink(r.base_reach_tolerance, scale, cfg.tolerance_floor);
            }
            Archetype::ResistanceMatching(r) => {
                r.tolerance = shrink(r.base_tolerance, scale, cfg.tolerance_floor);
            }
            Archetype::OrderedSequence(o) => {
                o.sequence_length = (grow(o.base_sequence_length as f32, scale, cfg.sequence_length_ceiling as f32)
                    .floor() as u32)
                    .clamp(o.base_sequence_length, cfg.sequence_length_ceiling);
                o.key_time_budget_ms =
                    shrink(o.base_key_time_budget_ms, scale, cfg.key_time_budget_floor_ms);
            }
            Archetype::BossFirst(b) => {
                b.slam_cycles = (grow(b.base_slam_cycles as f32, scale, cfg.slam_cycles_ceiling as f32)
                    .floor() as u32)
                    .clamp(b.base_slam_cycles, cfg.slam_cycles_ceiling);
                b.counter_window = shrink(b.base_counter_window, scale, cfg.counter_window_floor);
            }
        }

        if self.last.map(|l| l.phase_index) != Some(phase_index) {
            log::info!("Escalation phase {} (tension {:.3})", phase_index, tension);
        }
        self.last = Some(snapshot);
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::dream::spawn_dream_from_seed;
    use proptest::prelude::*;

    #[test]
    fn test_scale_is_one_at_rest() {
        let d = spawn_dream_from_seed("d");
        assert_eq!(scale_factor(&d.difficulty, 0.0, 1e9), 1.0);
        assert_eq!(scale_factor(&d.difficulty, 0.9, 0.0), 1.0);
        assert_eq!(scale_factor(&d.difficulty, f32::NAN, f64::NAN), 1.0);
    }

    #[test]
    fn test_scale_grows_with_time_and_tension() {
        let d = spawn_dream_from_seed("d");
        let a = scale_factor(&d.difficulty, 0.5, 60_000.0);
        let b = scale_factor(&d.difficulty, 0.5, 600_000.0);
        let c = scale_factor(&d.difficulty, 0.9, 600_000.0);
        assert!(1.0 < a && a < b && b < c);
    }

    #[test]
    fn test_update_writes_live_fields() {
        let mut d = spawn_dream_from_seed("d");
        let mut scaler = DifficultyScaler::new();
        let snap = scaler.update(&mut d, 0.5, 10.0 * 60_000.0);
        assert!(snap.scale > 1.0);
        assert_eq!(d.live.spawn_interval_ms, snap.spawn_interval_ms);
        assert!(d.live.spawn_interval_ms < d.phases[0].spawn_interval_ms);
        assert!(d.live.boss_threshold < d.base.boss_threshold);
        assert!(d.live.morph_speed > d.base.morph_speed);
        match &d.archetype {
            Archetype::RotatingReach(r) => assert!(r.rotation_rpm > r.base_rotation_rpm),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(scaler.last(), Some(&snap));
    }

    #[test]
    fn test_modifier_bounded_for_huge_elapsed() {
        let d = spawn_dream_from_seed("c");
        let scale = scale_factor(&d.difficulty, MAX_TENSION, 1e300);
        let m = increase_modifier(&d.difficulty, scale);
        assert!(m >= 1.0 && m <= d.difficulty.max_increase_modifier);
    }

    fn seeds() -> impl Strategy<Value = String> {
        "[a-z]{1,8}"
    }

    proptest! {
        #[test]
        fn prop_outputs_within_bounds(
            seed in seeds(),
            tension in 0.0f32..=0.999,
            elapsed in 0.0f64..1e10,
        ) {
            let mut d = spawn_dream_from_seed(&seed);
            let cfg = d.difficulty;
            let snap = DifficultyScaler::new().update(&mut d, tension, elapsed);
            let phase = &d.phases[snap.phase_index];

            prop_assert!(snap.scale >= 1.0 && snap.scale.is_finite());
            prop_assert!(snap.spawn_interval_ms >= cfg.spawn_interval_floor_ms);
            prop_assert!(snap.spawn_interval_ms <= phase.spawn_interval_ms);
            prop_assert!(snap.enemy_cap >= phase.enemy_count.min(cfg.enemy_cap_ceiling));
            prop_assert!(snap.enemy_cap <= cfg.enemy_cap_ceiling);
            prop_assert!(snap.morph_speed >= d.base.morph_speed);
            prop_assert!(snap.morph_speed <= cfg.morph_speed_ceiling);
            prop_assert!(snap.boss_threshold >= cfg.boss_threshold_floor);
            prop_assert!(snap.boss_threshold <= d.base.boss_threshold);
            prop_assert!(snap.pattern_complexity >= 2 && snap.pattern_complexity <= 6);
            prop_assert!(snap.tension_increase_modifier >= 1.0);
            prop_assert!(snap.tension_increase_modifier <= cfg.max_increase_modifier);

            match &d.archetype {
                Archetype::RotatingReach(r) => {
                    prop_assert!(r.rotation_rpm >= r.base_rotation_rpm && r.rotation_rpm <= 18.0);
                    prop_assert!(r.reach_tolerance >= 0.04 && r.reach_tolerance <= r.base_reach_tolerance);
                }
                Archetype::ResistanceMatching(r) => {
                    prop_assert!(r.tolerance >= 0.04 && r.tolerance <= r.base_tolerance);
                }
                Archetype::OrderedSequence(o) => {
                    prop_assert!(o.sequence_length >= o.base_sequence_length && o.sequence_length <= 7);
                    prop_assert!(o.key_time_budget_ms >= 250.0 && o.key_time_budget_ms <= o.base_key_time_budget_ms);
                }
                Archetype::BossFirst(b) => {
                    prop_assert!(b.slam_cycles >= 3 && b.slam_cycles <= 5);
                    prop_assert!(b.counter_window >= 1.5 && b.counter_window <= b.base_counter_window);
                }
            }
        }
    }
}
