//! Performance-adaptive director
//!
//! Watches how the player is doing (rolling hit/miss window, combo, boss
//! counters) plus externally reported panic, and proposes a tension level.
//! The director never writes tension directly: it keeps its own
//! `target_tension`, a smoothed `proposal` that chases it, and the run blends
//! the proposal into the governor.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::consts::{DIRECTOR_MAX_PROPOSAL, DIRECTOR_WINDOW_SECS};
use crate::sanitize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DirectorState {
    Building,
    Sustaining,
    Relieving,
    Surging,
}

/// Externally reported performance values
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceTelemetry {
    /// 0-100
    pub panic: f32,
    pub combo: u32,
    pub wave: u32,
    pub boss_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Hit,
    Miss,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectorTransition {
    pub from: DirectorState,
    pub to: DirectorState,
}

/// How fast the proposal chases the target (per second)
const PROPOSAL_BLEND: f32 = 0.8;
const RELIEF_DROP: f32 = 0.3;
const RELIEF_DRAIN_PER_SEC: f32 = 0.05;
const RELIEF_FLOOR: f32 = 0.1;
const SURGE_SPIKE: f32 = 0.25;
const SUSTAIN_TARGET: f32 = 0.5;
const SUSTAIN_NUDGE: f32 = 0.01;

#[derive(Debug, Clone)]
pub struct Director {
    state: DirectorState,
    time_in_state: f32,
    clock: f64,
    actions: VecDeque<(f64, Action)>,
    telemetry: PerformanceTelemetry,
    counters: u32,
    escapes: u32,
    target_tension: f32,
    proposal: f32,
}

impl Default for Director {
    fn default() -> Self {
        Self::new()
    }
}

impl Director {
    pub fn new() -> Self {
        Self {
            state: DirectorState::Building,
            time_in_state: 0.0,
            clock: 0.0,
            actions: VecDeque::new(),
            telemetry: PerformanceTelemetry::default(),
            counters: 0,
            escapes: 0,
            target_tension: 0.0,
            proposal: 0.0,
        }
    }

    pub fn state(&self) -> DirectorState {
        self.state
    }

    pub fn time_in_state(&self) -> f32 {
        self.time_in_state
    }

    pub fn target_tension(&self) -> f32 {
        self.target_tension
    }

    /// Smoothed value offered to the tension governor
    pub fn proposal(&self) -> f32 {
        self.proposal
    }

    pub fn telemetry(&self) -> &PerformanceTelemetry {
        &self.telemetry
    }

    pub fn report(&mut self, telemetry: PerformanceTelemetry) {
        self.telemetry = PerformanceTelemetry {
            panic: sanitize(telemetry.panic, 0.0, 100.0),
            ..telemetry
        };
    }

    pub fn record_hit(&mut self) {
        self.actions.push_back((self.clock, Action::Hit));
    }

    pub fn record_miss(&mut self) {
        self.actions.push_back((self.clock, Action::Miss));
    }

    /// Boss attack answered
    pub fn record_counter(&mut self) {
        self.counters += 1;
    }

    /// Boss attack got through
    pub fn record_escape(&mut self) {
        self.escapes += 1;
    }

    /// Hit ratio inside the window; 0.5 with no data
    pub fn accuracy(&self) -> f32 {
        let hits = self.actions.iter().filter(|(_, a)| *a == Action::Hit).count();
        if self.actions.is_empty() {
            0.5
        } else {
            hits as f32 / self.actions.len() as f32
        }
    }

    /// `accuracy*0.4 + min(1, combo/15)*0.3 + counter_ratio*0.3`
    pub fn skill(&self) -> f32 {
        let combo = (self.telemetry.combo as f32 / 15.0).min(1.0);
        let ratio = if self.counters + self.escapes == 0 {
            0.5
        } else {
            self.counters as f32 / (self.counters + self.escapes) as f32
        };
        self.accuracy() * 0.4 + combo * 0.3 + ratio * 0.3
    }

    /// Align target and proposal with the live tension (run start)
    pub fn anchor(&mut self, tension: f32) {
        let t = sanitize(tension, 0.0, DIRECTOR_MAX_PROPOSAL);
        self.target_tension = t;
        self.proposal = t;
    }

    /// Pick the next state. Panic checks win over the surge rule, and Surging
    /// is never entered while a boss is on screen (the boss already owns
    /// tension then).
    fn next_state(&self, tension: f32, skill: f32) -> Option<DirectorState> {
        let panic = self.telemetry.panic;
        let t = self.time_in_state;
        use DirectorState::*;
        match self.state {
            Building => {
                if panic > 80.0 {
                    Some(Relieving)
                } else if panic > 60.0 {
                    Some(Sustaining)
                } else if tension > 0.7 && skill > 0.7 && t > 3.0 && !self.telemetry.boss_active {
                    Some(Surging)
                } else if skill < 0.35 {
                    Some(Sustaining)
                } else {
                    None
                }
            }
            Sustaining => {
                if skill > 0.6 && panic < 40.0 && t > 4.0 {
                    Some(Building)
                } else if panic > 75.0 || skill < 0.25 {
                    Some(Relieving)
                } else {
                    None
                }
            }
            Relieving => {
                if panic < 50.0 && skill > 0.4 && t > 5.0 {
                    Some(Building)
                } else {
                    None
                }
            }
            Surging => {
                if t > 4.0 {
                    Some(if panic > 50.0 { Relieving } else { Sustaining })
                } else {
                    None
                }
            }
        }
    }

    fn enter(&mut self, to: DirectorState) -> DirectorTransition {
        let from = self.state;
        self.state = to;
        self.time_in_state = 0.0;
        match to {
            DirectorState::Relieving => self.target_tension -= RELIEF_DROP,
            DirectorState::Surging => self.target_tension += SURGE_SPIKE,
            _ => {}
        }
        self.target_tension = sanitize(self.target_tension, 0.0, DIRECTOR_MAX_PROPOSAL);
        log::info!("Director {:?} -> {:?}", from, to);
        DirectorTransition { from, to }
    }

    /// Advance by `dt` seconds given the live tension
    pub fn update(&mut self, dt: f32, tension: f32) -> Option<DirectorTransition> {
        let dt = sanitize(dt, 0.0, 1.0);
        self.clock += f64::from(dt);
        self.time_in_state += dt;

        let cutoff = self.clock - DIRECTOR_WINDOW_SECS;
        while self.actions.front().is_some_and(|(at, _)| *at < cutoff) {
            self.actions.pop_front();
        }

        let skill = self.skill();
        let transition = self
            .next_state(sanitize(tension, 0.0, 1.0), skill)
            .map(|to| self.enter(to));

        match self.state {
            DirectorState::Building => {
                self.target_tension += (0.03 + skill * 0.05) * dt;
            }
            DirectorState::Sustaining => {
                self.target_tension += (SUSTAIN_TARGET - self.target_tension) * SUSTAIN_NUDGE;
            }
            DirectorState::Relieving => {
                self.target_tension =
                    (self.target_tension - RELIEF_DRAIN_PER_SEC * dt).max(RELIEF_FLOOR.min(self.target_tension));
            }
            DirectorState::Surging => {}
        }
        self.target_tension = sanitize(self.target_tension, 0.0, DIRECTOR_MAX_PROPOSAL);

        let blend = (PROPOSAL_BLEND * dt).min(1.0);
        self.proposal += (self.target_tension - self.proposal) * blend;
        self.proposal = sanitize(self.proposal, 0.0, DIRECTOR_MAX_PROPOSAL);

        transition
    }

    pub fn dispose(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn run(d: &mut Director, secs: f32, tension: f32) -> Vec<DirectorTransition> {
        let mut out = Vec::new();
        let mut t = 0.0;
        while t < secs {
            out.extend(d.update(DT, tension));
            t += DT;
        }
        out
    }

    #[test]
    fn test_skill_defaults() {
        let d = Director::new();
        // 0.5*0.4 + 0 + 0.5*0.3
        assert!((d.skill() - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_window_drops_old_actions() {
        let mut d = Director::new();
        d.record_miss();
        d.record_miss();
        run(&mut d, 1.0, 0.3);
        assert_eq!(d.accuracy(), 0.0);
        d.record_hit();
        run(&mut d, 4.5, 0.3);
        // The misses are now older than 5 s, the hit is not
        assert_eq!(d.accuracy(), 1.0);
    }

    #[test]
    fn test_panic_forces_relief() {
        let mut d = Director::new();
        d.anchor(0.6);
        d.report(PerformanceTelemetry {
            panic: 90.0,
            ..Default::default()
        });
        let tr = d.update(DT, 0.6).unwrap();
        assert_eq!(tr, DirectorTransition { from: DirectorState::Building, to: DirectorState::Relieving });
        assert!(d.target_tension() < 0.31);
    }

    #[test]
    fn test_low_skill_sustains() {
        let mut d = Director::new();
        for _ in 0..10 {
            d.record_miss();
        }
        let tr = d.update(DT, 0.2).unwrap();
        assert_eq!(tr.to, DirectorState::Sustaining);
    }

    #[test]
    fn test_skilled_player_surges_then_settles() {
        let mut d = Director::new();
        d.anchor(0.6);
        d.report(PerformanceTelemetry {
            panic: 10.0,
            combo: 30,
            ..Default::default()
        });
        for _ in 0..20 {
            d.record_hit();
        }
        d.record_counter();

        let trs = run(&mut d, 3.5, 0.8);
        assert_eq!(trs.last().map(|t| t.to), Some(DirectorState::Surging));
        let spiked = d.target_tension();
        assert!(spiked > 0.8);

        // Surging holds its target, then settles into Sustaining (low panic)
        let trs = run(&mut d, 4.5, 0.8);
        assert_eq!(trs.first().map(|t| t.to), Some(DirectorState::Sustaining));
    }

    #[test]
    fn test_boss_blocks_surge() {
        let mut d = Director::new();
        d.report(PerformanceTelemetry {
            panic: 10.0,
            combo: 30,
            boss_active: true,
            ..Default::default()
        });
        for _ in 0..20 {
            d.record_hit();
        }
        let trs = run(&mut d, 4.0, 0.9);
        assert!(trs.iter().all(|t| t.to != DirectorState::Surging));
    }

    #[test]
    fn test_proposal_never_jumps() {
        let mut d = Director::new();
        d.anchor(0.6);
        d.report(PerformanceTelemetry {
            panic: 95.0,
            ..Default::default()
        });
        let before = d.proposal();
        d.update(DT, 0.6);
        // Target dropped by ~0.3, proposal moved by at most 0.8*dt of the gap
        assert!((before - d.proposal()).abs() <= 0.31 * 0.8 * DT);
        assert!(d.proposal() <= DIRECTOR_MAX_PROPOSAL);
    }

    /// Skilled player with full hit window, high combo and a boss counter
    fn skilled(panic: f32) -> Director {
        let mut d = Director::new();
        d.report(PerformanceTelemetry {
            panic,
            combo: 30,
            ..Default::default()
        });
        for _ in 0..20 {
            d.record_hit();
        }
        d.record_counter();
        d
    }

    fn set_panic(d: &mut Director, panic: f32) {
        let t = *d.telemetry();
        d.report(PerformanceTelemetry { panic, ..t });
    }

    #[test]
    fn test_panic_beats_surge() {
        let mut d = skilled(10.0);
        d.anchor(0.6);
        // Just short of the surge gate
        assert!(run(&mut d, 2.9, 0.8).is_empty());
        set_panic(&mut d, 90.0);
        let trs = run(&mut d, 0.1, 0.8);
        assert_eq!(trs.first().map(|t| t.to), Some(DirectorState::Relieving));
        assert!(trs.iter().all(|t| t.to != DirectorState::Surging));
    }

    #[test]
    fn test_moderate_panic_beats_surge() {
        let mut d = skilled(10.0);
        assert!(run(&mut d, 2.9, 0.8).is_empty());
        set_panic(&mut d, 70.0);
        let trs = run(&mut d, 0.1, 0.8);
        assert_eq!(trs.first().map(|t| t.to), Some(DirectorState::Sustaining));
    }

    #[test]
    fn test_sustaining_escalates_to_relief() {
        let mut d = Director::new();
        d.report(PerformanceTelemetry {
            panic: 65.0,
            ..Default::default()
        });
        assert_eq!(d.update(DT, 0.5).map(|t| t.to), Some(DirectorState::Sustaining));
        set_panic(&mut d, 76.0);
        let tr = d.update(DT, 0.5).unwrap();
        assert_eq!(tr, DirectorTransition { from: DirectorState::Sustaining, to: DirectorState::Relieving });
    }

    #[test]
    fn test_very_low_skill_relieves_from_sustaining() {
        let mut d = Director::new();
        for _ in 0..10 {
            d.record_miss();
        }
        // accuracy 0, combo 0, ratio 0.5 -> skill 0.15
        assert_eq!(d.update(DT, 0.2).map(|t| t.to), Some(DirectorState::Sustaining));
        assert_eq!(d.update(DT, 0.2).map(|t| t.to), Some(DirectorState::Relieving));
    }

    #[test]
    fn test_relief_recovers_after_five_seconds() {
        let mut d = skilled(90.0);
        assert_eq!(d.update(DT, 0.5).map(|t| t.to), Some(DirectorState::Relieving));
        set_panic(&mut d, 30.0);
        // Skill and panic qualify, but the time gate holds
        assert!(run(&mut d, 4.9, 0.5).is_empty());
        assert_eq!(d.state(), DirectorState::Relieving);
        // Keep the window topped up so skill stays high
        for _ in 0..20 {
            d.record_hit();
        }
        let trs = run(&mut d, 0.3, 0.5);
        assert_eq!(trs, vec![DirectorTransition { from: DirectorState::Relieving, to: DirectorState::Building }]);
    }

    #[test]
    fn test_surge_ends_in_relief_under_panic() {
        let mut d = skilled(10.0);
        d.anchor(0.6);
        while d.update(DT, 0.8).is_none() {}
        assert_eq!(d.state(), DirectorState::Surging);
        // Panic between 50 and 80 does not interrupt a surge early
        set_panic(&mut d, 60.0);
        assert!(run(&mut d, 3.9, 0.8).is_empty());
        let trs = run(&mut d, 0.3, 0.8);
        assert_eq!(trs, vec![DirectorTransition { from: DirectorState::Surging, to: DirectorState::Relieving }]);
    }

    #[test]
    fn test_building_drift_rate() {
        let mut d = Director::new();
        d.anchor(0.2);
        d.record_hit();
        // 1.0*0.4 + 0 + 0.5*0.3: stays in Building
        let skill = d.skill();
        assert!((skill - 0.55).abs() < 1e-6);
        assert!(d.update(DT, 0.2).is_none());
        let expected = 0.2 + (0.03 + skill * 0.05) * DT;
        assert!((d.target_tension() - expected).abs() < 1e-6);

        for _ in 0..59 {
            d.update(DT, 0.2);
        }
        assert_eq!(d.state(), DirectorState::Building);
        assert!((d.target_tension() - (0.2 + 0.03 + skill * 0.05)).abs() < 1e-4);
    }

    #[test]
    fn test_relief_drains_to_floor() {
        let mut d = Director::new();
        d.anchor(0.9);
        d.report(PerformanceTelemetry {
            panic: 90.0,
            ..Default::default()
        });
        d.update(DT, 0.9);
        assert_eq!(d.state(), DirectorState::Relieving);
        let entered = d.target_tension();
        // 0.9 - 0.3 on entry, then the first tick of drain
        assert!((entered - (0.6 - RELIEF_DRAIN_PER_SEC * DT)).abs() < 1e-5);

        run(&mut d, 2.0, 0.9);
        assert!((d.target_tension() - (entered - RELIEF_DRAIN_PER_SEC * 2.0)).abs() < 0.01);

        run(&mut d, 20.0, 0.9);
        assert!((d.target_tension() - RELIEF_FLOOR).abs() < 1e-6);
    }

    #[test]
    fn test_sustaining_converges_to_half() {
        let mut d = Director::new();
        d.anchor(0.9);
        d.report(PerformanceTelemetry {
            panic: 65.0,
            ..Default::default()
        });
        run(&mut d, 10.0, 0.5);
        assert_eq!(d.state(), DirectorState::Sustaining);
        assert!((d.target_tension() - 0.5).abs() < 0.01);
    }
}
