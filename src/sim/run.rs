//! Run orchestration
//!
//! [`DreamRun`] owns exactly one of every component and advances them in a
//! fixed order each tick:
//!
//! 1. input events (releases, holds, misses, boss input, remote corruption)
//! 2. echo expiry
//! 3. difficulty scaler (reads tension after all input for this tick)
//! 4. boss controller (sees the refreshed dream)
//! 5. director, then its proposal is blended into the governor
//! 6. shatter signal

use serde::{Deserialize, Serialize};

use super::boss::{BossController, BossEvent, BossOutcome};
use super::difficulty::DifficultyScaler;
use super::director::{Director, DirectorState, DirectorTransition, PerformanceTelemetry};
use super::dream::{Dream, spawn_dream_from_seed};
use super::echo::EchoField;
use super::mechanics::{self, AnalogInput};
use super::stabilization::StabilizationTracker;
use super::tension::TensionGovernor;
use crate::consts::REMOTE_CORRUPTION;
use crate::sanitize;
use crate::settings::Settings;

/// Input gathered for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Keys pressed this tick with their grip strength
    pub holds: Vec<(char, f32)>,
    pub releases: Vec<char>,
    /// Patterns that reached the boundary unresolved
    pub misses: Vec<char>,
    /// Grip held against the boss this tick
    pub boss_grip: Option<f32>,
    pub counter_pulses: u32,
    /// Shared-corruption ticks relayed from other players
    pub remote_corruption_ticks: u32,
    pub analog: Option<AnalogInput>,
    pub telemetry: Option<PerformanceTelemetry>,
}

/// Everything the presentation layer may react to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// Tension hit the ceiling; the run is frozen until `reset`
    Shatter,
    Rebound,
    Coherence,
    EchoSpawned(char),
    EchoExpired(char),
    /// A missed pattern should spawn an enemy for this key
    EnemySpawnRequested(char),
    PhaseChanged(usize),
    Boss(BossEvent),
    Director(DirectorTransition),
}

/// Serializable end-of-run report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: String,
    pub archetype: String,
    pub ticks: u64,
    pub elapsed_secs: f64,
    pub final_tension: f32,
    pub shattered: bool,
    pub boss_outcomes: Vec<BossOutcome>,
    pub director_state: DirectorState,
}

#[derive(Debug)]
pub struct DreamRun {
    settings: Settings,
    dream: Option<Dream>,
    governor: TensionGovernor,
    scaler: DifficultyScaler,
    tracker: StabilizationTracker,
    echoes: EchoField,
    boss: BossController,
    director: Director,
    analog: Option<AnalogInput>,
    elapsed_ms: f64,
    ticks: u64,
    phase_index: Option<usize>,
    shattered: bool,
    boss_outcomes: Vec<BossOutcome>,
    /// Events produced by direct calls between ticks
    pending: Vec<SimEvent>,
}

impl Default for DreamRun {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl DreamRun {
    pub fn new(settings: Settings) -> Self {
        let settings = settings.sanitized();
        Self {
            governor: TensionGovernor::new(settings.rebound_salt),
            scaler: DifficultyScaler::new(),
            tracker: StabilizationTracker::new(),
            echoes: EchoField::new(settings.echo_ttl_ms),
            boss: BossController::new(settings.boss_timings),
            director: Director::new(),
            dream: None,
            analog: None,
            elapsed_ms: 0.0,
            ticks: 0,
            phase_index: None,
            shattered: false,
            boss_outcomes: Vec::new(),
            pending: Vec::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn dream(&self) -> Option<&Dream> {
        self.dream.as_ref()
    }

    pub fn tension(&self) -> f32 {
        self.governor.tension()
    }

    pub fn governor(&self) -> &TensionGovernor {
        &self.governor
    }

    /// Listener subscription and the terminal sequence's freeze/unfreeze
    pub fn governor_mut(&mut self) -> &mut TensionGovernor {
        &mut self.governor
    }

    pub fn tracker(&self) -> &StabilizationTracker {
        &self.tracker
    }

    pub fn echoes(&self) -> &EchoField {
        &self.echoes
    }

    pub fn boss(&self) -> &BossController {
        &self.boss
    }

    pub fn director(&self) -> &Director {
        &self.director
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_shattered(&self) -> bool {
        self.shattered
    }

    /// Clear every component's run state, governor listeners included.
    /// Hosts re-subscribe after each new dream.
    fn dispose_components(&mut self) {
        self.governor.dispose();
        self.scaler.dispose();
        self.tracker.dispose();
        self.echoes.dispose();
        self.boss.dispose();
        self.director.dispose();
        self.analog = None;
        self.elapsed_ms = 0.0;
        self.ticks = 0;
        self.phase_index = None;
        self.shattered = false;
        self.boss_outcomes.clear();
        self.pending.clear();
    }

    /// Discard the current run and start a new dream from `seed`
    pub fn spawn_dream_from_seed(&mut self, seed: &str) -> &Dream {
        self.dispose_components();
        let dream = spawn_dream_from_seed(seed);

        self.governor
            .reseed(u64::from(dream.seed_hash) ^ self.settings.rebound_salt);
        self.governor.init(dream.tension_curve);
        self.tracker.set_required(&dream.phases[0].keys);
        self.director.anchor(self.governor.tension());

        self.dream.insert(dream)
    }

    /// Restart with the current seed
    pub fn reset(&mut self) {
        match self.dream.as_ref().map(|d| d.seed.clone()) {
            Some(seed) => {
                log::info!("Restarting dream '{seed}'");
                self.spawn_dream_from_seed(&seed);
            }
            None => log::warn!("reset called with no active dream"),
        }
    }

    pub fn hold_key(&mut self, key: char, grip_strength: f32) {
        let Some(dream) = self.dream.as_ref() else {
            log::warn!("hold_key('{key}') with no active dream");
            return;
        };
        let outcome =
            self.tracker
                .hold_key(key, grip_strength, &dream.tension_curve, &mut self.governor);
        if !outcome.accepted {
            return;
        }
        self.boss.note_stabilized();
        self.director.record_hit();
        if outcome.coherence {
            self.pending.push(SimEvent::Coherence);
        }
        if outcome.rebound {
            self.pending.push(SimEvent::Rebound);
        }
    }

    pub fn release_key(&mut self, key: char) {
        self.tracker.release_key(key);
    }

    pub fn missed_pattern(&mut self, key: char) {
        if self.dream.is_none() {
            log::warn!("missed_pattern('{key}') with no active dream");
            return;
        }
        self.pending.push(SimEvent::EnemySpawnRequested(key));
        if self.echoes.spawn_echo(key, self.elapsed_ms, &mut self.governor) {
            self.pending.push(SimEvent::EchoSpawned(key));
        }
        self.boss.note_miss();
        self.director.record_miss();
    }

    pub fn boss_grip(&mut self, grip_strength: f32) {
        self.boss.apply_grip(grip_strength);
    }

    pub fn boss_counter_pulse(&mut self) {
        self.boss.counter_pulse();
    }

    /// Shared corruption relayed from a remote player
    pub fn remote_corruption_tick(&mut self) {
        self.governor.increase(REMOTE_CORRUPTION);
    }

    pub fn report_telemetry(&mut self, telemetry: PerformanceTelemetry) {
        self.director.report(telemetry);
    }

    /// Latest analog state; persists until replaced
    pub fn set_analog(&mut self, input: AnalogInput) {
        self.analog = Some(input);
    }

    fn apply_input(&mut self, input: &TickInput) {
        for key in &input.releases {
            self.release_key(*key);
        }
        for (key, grip) in &input.holds {
            self.hold_key(*key, *grip);
        }
        for key in &input.misses {
            self.missed_pattern(*key);
        }
        if let Some(grip) = input.boss_grip {
            self.boss_grip(grip);
        }
        for _ in 0..input.counter_pulses {
            self.boss_counter_pulse();
        }
        for _ in 0..input.remote_corruption_ticks {
            self.remote_corruption_tick();
        }
        if let Some(t) = input.telemetry {
            self.report_telemetry(t);
        }
        if let Some(a) = input.analog {
            self.set_analog(a);
        }
    }

    /// Advance the run by `dt` seconds
    pub fn tick(&mut self, dt: f32, input: &TickInput) -> Vec<SimEvent> {
        if self.dream.is_none() {
            log::warn!("tick with no active dream");
            return Vec::new();
        }
        if self.shattered {
            return std::mem::take(&mut self.pending);
        }
        let dt = sanitize(dt, 0.0, self.settings.max_frame_dt);

        self.apply_input(input);
        let mut events = std::mem::take(&mut self.pending);

        let Some(dream) = self.dream.as_mut() else {
            return events;
        };
        let time_secs = (self.elapsed_ms / 1000.0) as f32;

        // Continuous analog stabilization
        if let Some(analog) = self.analog {
            if let Some(grip) = mechanics::evaluate(&dream.archetype, time_secs, &analog) {
                if self
                    .governor
                    .decrease(dream.tension_curve.hold_decrease * dt, grip)
                {
                    events.push(SimEvent::Rebound);
                }
                self.boss.note_stabilized();
            }
        }

        self.elapsed_ms += f64::from(dt) * 1000.0;
        events.extend(self.echoes.expire(self.elapsed_ms).into_iter().map(SimEvent::EchoExpired));

        let snapshot = self
            .scaler
            .update(dream, self.governor.tension(), self.elapsed_ms);
        self.governor
            .set_increase_modifier(snapshot.tension_increase_modifier);
        if self.phase_index != Some(snapshot.phase_index) {
            self.phase_index = Some(snapshot.phase_index);
            self.tracker
                .set_required(&dream.phases[snapshot.phase_index].keys);
            events.push(SimEvent::PhaseChanged(snapshot.phase_index));
        }

        let mut boss_events = self.boss.try_spawn(self.governor.tension(), dream);
        boss_events.extend(self.boss.update(dt, &mut self.governor));
        for event in &boss_events {
            if let BossEvent::Resolved(outcome) = event {
                self.boss_outcomes.push(*outcome);
                match outcome {
                    BossOutcome::Success | BossOutcome::Partial => self.director.record_counter(),
                    BossOutcome::Failure => self.director.record_escape(),
                }
            }
        }
        events.extend(boss_events.into_iter().map(SimEvent::Boss));

        let mut telemetry = *self.director.telemetry();
        telemetry.boss_active |= self.boss.is_active();
        self.director.report(telemetry);
        if let Some(tr) = self.director.update(dt, self.governor.tension()) {
            events.push(SimEvent::Director(tr));
        }
        // The boss owns tension while it is on screen
        if !self.boss.is_active() {
            let rate = sanitize(self.settings.director_blend_rate * dt, 0.0, 1.0);
            self.governor.nudge_toward(self.director.proposal(), rate);
        }

        if self.governor.take_shatter_signal() {
            log::info!("Dream '{}' shattered after {} ticks", dream.seed, self.ticks);
            self.shattered = true;
            events.push(SimEvent::Shatter);
        }

        self.ticks += 1;
        events
    }

    pub fn summary(&self) -> Option<RunSummary> {
        let dream = self.dream.as_ref()?;
        Some(RunSummary {
            seed: dream.seed.clone(),
            archetype: dream.kind().as_str().to_string(),
            ticks: self.ticks,
            elapsed_secs: self.elapsed_ms / 1000.0,
            final_tension: self.governor.tension(),
            shattered: self.shattered,
            boss_outcomes: self.boss_outcomes.clone(),
            director_state: self.director.state(),
        })
    }
}
