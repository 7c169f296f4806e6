//! Boss encounter controller
//!
//! Five phases in fixed order: Emerge → Descend → SlamPrep → Impact → Resolve.
//! An encounter starts when tension reaches the dream's live boss threshold
//! or after three consecutive misses, and only one can be active. Phase
//! timing is driven by `update(dt)`; the effects of each phase (impact
//! tension, resolve outcome) are applied here.

use serde::{Deserialize, Serialize};

use super::dream::{Archetype, Dream};
use super::seed::EnemyTrait;
use super::tension::TensionGovernor;
use crate::consts::*;
use crate::settings::BossTimings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BossPhase {
    Emerge,
    Descend,
    SlamPrep,
    Impact,
    Resolve,
}

impl BossPhase {
    /// Phase number 0-4
    pub fn index(&self) -> u8 {
        match self {
            BossPhase::Emerge => 0,
            BossPhase::Descend => 1,
            BossPhase::SlamPrep => 2,
            BossPhase::Impact => 3,
            BossPhase::Resolve => 4,
        }
    }

    pub fn duration(&self, timings: &BossTimings) -> f32 {
        match self {
            BossPhase::Emerge => timings.emerge,
            BossPhase::Descend => timings.descend,
            BossPhase::SlamPrep => timings.slam_prep,
            BossPhase::Impact => timings.impact,
            BossPhase::Resolve => timings.resolve,
        }
    }
}

/// Why an encounter started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossTrigger {
    Tension,
    Misses,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BossOutcome {
    /// Health fully drained
    Success,
    /// Health left at or below the partial threshold
    Partial,
    /// Boss escaped; the run is pushed to the ceiling
    Failure,
}

/// Outbound effects of the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BossEvent {
    Spawned(BossTrigger),
    PhaseEntered(BossPhase),
    WorldImpact,
    Resolved(BossOutcome),
    /// One minor enemy per trait replaces a defeated boss
    ReplacementEnemies(Vec<EnemyTrait>),
    PermanentDegradation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossEncounter {
    pub phase: BossPhase,
    pub phase_elapsed: f32,
    pub health: f32,
    pub trigger: BossTrigger,
    /// Slam cycles still to run, including the current one
    pub slams_remaining: u32,
    /// Boss-first encounters also accept discrete counter pulses
    pub dual_input: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BossController {
    encounter: Option<BossEncounter>,
    consecutive_misses: u32,
    timings: BossTimings,
}

impl BossController {
    pub fn new(timings: BossTimings) -> Self {
        Self {
            encounter: None,
            consecutive_misses: 0,
            timings,
        }
    }

    pub fn encounter(&self) -> Option<&BossEncounter> {
        self.encounter.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.encounter.is_some()
    }

    /// Current phase number; 0 when no encounter is running
    pub fn phase_index(&self) -> u8 {
        self.encounter.as_ref().map_or(0, |e| e.phase.index())
    }

    /// Current health; 1.0 when no encounter is running
    pub fn health(&self) -> f32 {
        self.encounter.as_ref().map_or(BOSS_BASE_HEALTH, |e| e.health)
    }

    pub fn consecutive_misses(&self) -> u32 {
        self.consecutive_misses
    }

    pub fn note_miss(&mut self) {
        self.consecutive_misses = self.consecutive_misses.saturating_add(1);
    }

    /// Any successful stabilization breaks the miss streak
    pub fn note_stabilized(&mut self) {
        self.consecutive_misses = 0;
    }

    pub fn should_spawn(&self, tension: f32, threshold: f32) -> Option<BossTrigger> {
        if self.encounter.is_some() {
            return None;
        }
        if tension >= threshold {
            Some(BossTrigger::Tension)
        } else if self.consecutive_misses >= MISSES_FOR_BOSS {
            Some(BossTrigger::Misses)
        } else {
            None
        }
    }

    /// Start an encounter if conditions hold. Ignored while one is active.
    pub fn try_spawn(&mut self, tension: f32, dream: &Dream) -> Vec<BossEvent> {
        let Some(trigger) = self.should_spawn(tension, dream.live.boss_threshold) else {
            return Vec::new();
        };
        let (slams, dual_input) = match &dream.archetype {
            Archetype::BossFirst(b) => (b.slam_cycles.max(1), true),
            _ => (1, false),
        };
        log::info!(
            "Boss emerges ({:?}, tension {:.3}, {} slam cycle(s))",
            trigger,
            tension,
            slams
        );
        self.encounter = Some(BossEncounter {
            phase: BossPhase::Emerge,
            phase_elapsed: 0.0,
            health: dream.boss_start_health(),
            trigger,
            slams_remaining: slams,
            dual_input,
        });
        vec![
            BossEvent::Spawned(trigger),
            BossEvent::PhaseEntered(BossPhase::Emerge),
        ]
    }

    /// Held grip during Resolve, applied once per tick
    pub fn apply_grip(&mut self, grip_strength: f32) {
        if let Some(e) = self.encounter.as_mut() {
            if e.phase == BossPhase::Resolve {
                let grip = crate::sanitize(grip_strength, 0.0, 1.0);
                e.health -= grip * BOSS_GRIP_DAMAGE;
            }
        }
    }

    /// Discrete counter pulse (boss-first archetype only)
    pub fn counter_pulse(&mut self) {
        if let Some(e) = self.encounter.as_mut() {
            if e.phase == BossPhase::Resolve && e.dual_input {
                e.health -= BOSS_PULSE_DAMAGE;
            }
        }
    }

    /// Advance phase timers by `dt` seconds
    pub fn update(&mut self, dt: f32, governor: &mut TensionGovernor) -> Vec<BossEvent> {
        let mut events = Vec::new();
        let Some(mut e) = self.encounter.take() else {
            return events;
        };
        e.phase_elapsed += crate::sanitize(dt, 0.0, f32::MAX);

        // Several short phases can complete inside one long frame
        loop {
            let duration = e.phase.duration(&self.timings);
            if e.phase_elapsed < duration {
                break;
            }
            e.phase_elapsed -= duration;

            let next = match e.phase {
                BossPhase::Emerge => BossPhase::Descend,
                BossPhase::Descend => BossPhase::SlamPrep,
                BossPhase::SlamPrep => BossPhase::Impact,
                BossPhase::Impact => {
                    e.slams_remaining = e.slams_remaining.saturating_sub(1);
                    if e.slams_remaining > 0 {
                        BossPhase::SlamPrep
                    } else {
                        BossPhase::Resolve
                    }
                }
                BossPhase::Resolve => {
                    let outcome = Self::outcome_for(e.health);
                    events.extend(self.resolve(outcome, governor));
                    return events;
                }
            };

            e.phase = next;
            log::debug!("Boss phase {:?}", next);
            events.push(BossEvent::PhaseEntered(next));
            if next == BossPhase::Impact {
                governor.set_tension(BOSS_IMPACT_TENSION);
                events.push(BossEvent::WorldImpact);
            }
        }

        self.encounter = Some(e);
        events
    }

    pub fn outcome_for(health: f32) -> BossOutcome {
        if health <= 0.0 {
            BossOutcome::Success
        } else if health <= BOSS_PARTIAL_HEALTH {
            BossOutcome::Partial
        } else {
            BossOutcome::Failure
        }
    }

    fn resolve(&mut self, outcome: BossOutcome, governor: &mut TensionGovernor) -> Vec<BossEvent> {
        log::info!("Boss resolved: {:?}", outcome);
        let mut events = vec![BossEvent::Resolved(outcome)];
        match outcome {
            BossOutcome::Success => {
                events.push(BossEvent::ReplacementEnemies(EnemyTrait::ALL.to_vec()));
            }
            BossOutcome::Partial => {}
            BossOutcome::Failure => {
                governor.set_tension(MAX_TENSION);
                events.push(BossEvent::PermanentDegradation);
            }
        }
        self.dispose();
        events
    }

    /// Drop any encounter and the miss streak
    pub fn dispose(&mut self) {
        self.encounter = None;
        self.consecutive_misses = 0;
    }
}
