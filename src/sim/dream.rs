//! The Dream: one run's procedurally generated content record
//!
//! A dream is built once per seed by [`spawn_dream_from_seed`]. Its `base`
//! values and seed-derived records never change; the `live` block and the
//! live half of each archetype extension are rewritten every tick by the
//! difficulty scaler.
//!
//! Canonical derivation order (part of the replay contract):
//! 1. archetype = hash mod 4
//! 2. tension curve, difficulty config, audio params, resistance profile
//!    (each from its own stream)
//! 3. escalation phases, phase `i` sequences from `hash + i * PHASE_SALT`
//! 4. one shared "dream" stream, drawn in this order: boss threshold,
//!    morph speed, then the archetype extension fields

use serde::{Deserialize, Serialize};

use super::seed::{
    AudioParams, DifficultyConfig, EnemyTrait, ResistanceProfile, SeedStream, TensionCurve,
    TraitSelector, derive_audio_params, derive_difficulty_config, derive_resistance_profile,
    derive_seed_hash, derive_sequences, derive_tension_curve, derive_trait_selector,
};
use crate::consts::BOSS_BASE_HEALTH;

/// Offset between per-phase sequence streams
const PHASE_SALT: u32 = 7919;
/// Sequences generated per escalation phase
const SEQUENCES_PER_PHASE: usize = 8;

/// Which gameplay template a dream uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArchetypeKind {
    RotatingReach,
    ResistanceMatching,
    OrderedSequence,
    BossFirst,
}

impl ArchetypeKind {
    /// `hash mod 4` selects the archetype
    pub fn from_hash(hash: u32) -> Self {
        match hash % 4 {
            0 => ArchetypeKind::RotatingReach,
            1 => ArchetypeKind::ResistanceMatching,
            2 => ArchetypeKind::OrderedSequence,
            _ => ArchetypeKind::BossFirst,
        }
    }

    /// Full key alphabet; phases unlock it left to right
    pub fn alphabet(&self) -> [char; 5] {
        match self {
            ArchetypeKind::RotatingReach => ['A', 'S', 'D', 'F', 'G'],
            ArchetypeKind::ResistanceMatching => ['H', 'J', 'K', 'L', 'U'],
            ArchetypeKind::OrderedSequence => ['Q', 'W', 'E', 'R', 'T'],
            ArchetypeKind::BossFirst => ['Z', 'X', 'C', 'V', 'B'],
        }
    }

    pub fn thematic_trait(&self) -> EnemyTrait {
        match self {
            ArchetypeKind::RotatingReach => EnemyTrait::Loop,
            ArchetypeKind::ResistanceMatching => EnemyTrait::Static,
            ArchetypeKind::OrderedSequence => EnemyTrait::Fracture,
            ArchetypeKind::BossFirst => EnemyTrait::Void,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchetypeKind::RotatingReach => "rotating-reach",
            ArchetypeKind::ResistanceMatching => "resistance-matching",
            ArchetypeKind::OrderedSequence => "ordered-sequence",
            ArchetypeKind::BossFirst => "boss-first",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotatingReach {
    /// Seeded ring speed, in `[2, 8]` RPM
    pub base_rotation_rpm: f32,
    pub rotation_rpm: f32,
    /// Angular tolerance as a fraction of π
    pub base_reach_tolerance: f32,
    pub reach_tolerance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResistanceMatching {
    /// Seconds per resistance oscillation, in `[1.5, 4.0]`
    pub slit_period: f32,
    pub base_tolerance: f32,
    pub tolerance: f32,
    pub profile: ResistanceProfile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderedSequence {
    pub base_sequence_length: u32,
    pub sequence_length: u32,
    /// Hold time needed to lock a key in (ms), in `[800, 2000]`
    pub stabilization_hold_time: f32,
    pub base_key_time_budget_ms: f32,
    pub key_time_budget_ms: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BossFirst {
    pub boss_health: f32,
    pub base_slam_cycles: u32,
    pub slam_cycles: u32,
    /// Seconds the player has to answer each slam
    pub base_counter_window: f32,
    pub counter_window: f32,
}

/// Archetype-specific extension: exactly one shape per dream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Archetype {
    RotatingReach(RotatingReach),
    ResistanceMatching(ResistanceMatching),
    OrderedSequence(OrderedSequence),
    BossFirst(BossFirst),
}

impl Archetype {
    pub fn kind(&self) -> ArchetypeKind {
        match self {
            Archetype::RotatingReach(_) => ArchetypeKind::RotatingReach,
            Archetype::ResistanceMatching(_) => ArchetypeKind::ResistanceMatching,
            Archetype::OrderedSequence(_) => ArchetypeKind::OrderedSequence,
            Archetype::BossFirst(_) => ArchetypeKind::BossFirst,
        }
    }
}

/// One escalation step of a dream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPhase {
    /// Tension at which this phase becomes active
    pub tension_threshold: f32,
    /// Keys that must all be held for a coherent match
    pub keys: Vec<char>,
    /// Base time between spawns (ms)
    pub spawn_interval_ms: f32,
    pub enemy_count: u32,
    /// Pattern sequences drawn from `keys`
    pub sequences: Vec<Vec<char>>,
}

/// Unscaled values the difficulty scaler starts from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaseParams {
    pub boss_threshold: f32,
    pub morph_speed: f32,
}

/// Per-tick values written by the difficulty scaler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveParams {
    pub spawn_interval_ms: f32,
    pub enemy_cap: u32,
    pub morph_speed: f32,
    pub boss_threshold: f32,
    pub pattern_complexity: u32,
    pub tension_increase_modifier: f32,
}

/// A procedurally generated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dream {
    pub seed: String,
    pub seed_hash: u32,
    pub tension_curve: TensionCurve,
    pub difficulty: DifficultyConfig,
    pub audio: AudioParams,
    pub phases: Vec<EscalationPhase>,
    pub thematic_trait: EnemyTrait,
    pub base: BaseParams,
    pub live: LiveParams,
    pub archetype: Archetype,
}

impl Dream {
    pub fn kind(&self) -> ArchetypeKind {
        self.archetype.kind()
    }

    /// Index of the highest phase whose threshold `tension` has reached
    pub fn phase_index_for(&self, tension: f32) -> usize {
        self.phases
            .iter()
            .rposition(|p| tension >= p.tension_threshold)
            .unwrap_or(0)
    }

    pub fn phase_for(&self, tension: f32) -> &EscalationPhase {
        &self.phases[self.phase_index_for(tension)]
    }

    /// Fresh weighted trait sampler (same seed, same sequence)
    pub fn trait_selector(&self) -> TraitSelector {
        derive_trait_selector(self.seed_hash, self.thematic_trait)
    }

    /// Health a boss starts with in this dream
    pub fn boss_start_health(&self) -> f32 {
        match &self.archetype {
            Archetype::BossFirst(b) => b.boss_health,
            _ => BOSS_BASE_HEALTH,
        }
    }
}

fn build_phases(hash: u32, kind: ArchetypeKind) -> Vec<EscalationPhase> {
    let alphabet = kind.alphabet();
    const THRESHOLDS: [f32; 3] = [0.0, 0.55, 0.8];
    const SPAWN_MS: [f32; 3] = [2200.0, 1600.0, 1100.0];
    const ENEMIES: [u32; 3] = [3, 5, 8];

    (0..3)
        .map(|i| {
            let keys = alphabet[..3 + i].to_vec();
            let sequences = derive_sequences(
                hash.wrapping_add(i as u32 * PHASE_SALT),
                &keys,
                SEQUENCES_PER_PHASE,
            );
            EscalationPhase {
                tension_threshold: THRESHOLDS[i],
                keys,
                spawn_interval_ms: SPAWN_MS[i],
                enemy_count: ENEMIES[i],
                sequences,
            }
        })
        .collect()
}

fn build_archetype(kind: ArchetypeKind, hash: u32, s: &mut SeedStream) -> Archetype {
    match kind {
        ArchetypeKind::RotatingReach => {
            let rpm = s.range(2.0, 8.0);
            let tol = s.range(0.12, 0.2);
            Archetype::RotatingReach(RotatingReach {
                base_rotation_rpm: rpm,
                rotation_rpm: rpm,
                base_reach_tolerance: tol,
                reach_tolerance: tol,
            })
        }
        ArchetypeKind::ResistanceMatching => {
            let slit_period = s.range(1.5, 4.0);
            let tol = s.range(0.12, 0.2);
            Archetype::ResistanceMatching(ResistanceMatching {
                slit_period,
                base_tolerance: tol,
                tolerance: tol,
                profile: derive_resistance_profile(hash),
            })
        }
        ArchetypeKind::OrderedSequence => {
            let len = 3 + s.next_index(3) as u32;
            let hold = s.range(800.0, 2000.0);
            let budget = s.range(900.0, 1300.0);
            Archetype::OrderedSequence(OrderedSequence {
                base_sequence_length: len,
                sequence_length: len,
                stabilization_hold_time: hold,
                base_key_time_budget_ms: budget,
                key_time_budget_ms: budget,
            })
        }
        ArchetypeKind::BossFirst => {
            let window = s.range(2.5, 3.5);
            Archetype::BossFirst(BossFirst {
                boss_health: 1.5,
                base_slam_cycles: 3,
                slam_cycles: 3,
                base_counter_window: window,
                counter_window: window,
            })
        }
    }
}

/// Build the dream for `seed`. Pure and total: every seed yields a complete dream.
pub fn spawn_dream_from_seed(seed: &str) -> Dream {
    let hash = derive_seed_hash(seed);
    let kind = ArchetypeKind::from_hash(hash);

    let tension_curve = derive_tension_curve(hash);
    let difficulty = derive_difficulty_config(hash);
    let audio = derive_audio_params(hash);
    let phases = build_phases(hash, kind);

    let mut stream = SeedStream::new(hash);
    let boss_threshold = match kind {
        ArchetypeKind::BossFirst => stream.range(0.6, 0.75),
        _ => stream.range(0.75, 0.9),
    };
    let morph_speed = stream.range(0.8, 1.2);
    let archetype = build_archetype(kind, hash, &mut stream);

    let base = BaseParams {
        boss_threshold,
        morph_speed,
    };
    let live = LiveParams {
        spawn_interval_ms: phases[0].spawn_interval_ms,
        enemy_cap: phases[0].enemy_count,
        morph_speed,
        boss_threshold,
        pattern_complexity: 2,
        tension_increase_modifier: 1.0,
    };

    log::info!(
        "Spawned dream '{}' (hash {}): {}",
        seed,
        hash,
        kind.as_str()
    );

    Dream {
        seed: seed.to_string(),
        seed_hash: hash,
        tension_curve,
        difficulty,
        audio,
        phases,
        thematic_trait: kind.thematic_trait(),
        base,
        live,
        archetype,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_seed_archetypes() {
        let d = spawn_dream_from_seed("d");
        assert_eq!(d.seed_hash, 100);
        match &d.archetype {
            Archetype::RotatingReach(r) => assert!((2.0..=8.0).contains(&r.rotation_rpm)),
            other => panic!("expected rotating-reach, got {other:?}"),
        }

        let a = spawn_dream_from_seed("a");
        match &a.archetype {
            Archetype::ResistanceMatching(r) => assert!((1.5..=4.0).contains(&r.slit_period)),
            other => panic!("expected resistance-matching, got {other:?}"),
        }

        let b = spawn_dream_from_seed("b");
        match &b.archetype {
            Archetype::OrderedSequence(o) => {
                assert!((800.0..=2000.0).contains(&o.stabilization_hold_time))
            }
            other => panic!("expected ordered-sequence, got {other:?}"),
        }

        let c = spawn_dream_from_seed("c");
        match &c.archetype {
            Archetype::BossFirst(bf) => {
                assert_eq!(bf.slam_cycles, 3);
                assert_eq!(c.boss_start_health(), 1.5);
            }
            other => panic!("expected boss-first, got {other:?}"),
        }
    }

    #[test]
    fn test_determinism() {
        for seed in ["d", "neon lullaby", "", "ünïcødé ☾"] {
            let d1 = spawn_dream_from_seed(seed);
            let d2 = spawn_dream_from_seed(seed);
            assert_eq!(d1, d2);
            let mut s1 = d1.trait_selector();
            let mut s2 = d2.trait_selector();
            for _ in 0..32 {
                assert_eq!(s1.sample(), s2.sample());
            }
        }
    }

    #[test]
    fn test_archetype_completeness() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            let seed = format!("seed-{i}");
            let d = spawn_dream_from_seed(&seed);
            assert_eq!(d.kind(), ArchetypeKind::from_hash(derive_seed_hash(&seed)));
            assert_eq!(d.phases.len(), 3);
            assert!(d.tension_curve.increase_rate > 0.0);
            assert!(d.difficulty.k > 0.0);
            assert!(d.audio.base_frequency > 0.0);
            seen.insert(d.kind());
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_phase_sequences_use_phase_alphabet() {
        let d = spawn_dream_from_seed("pattern check");
        for phase in &d.phases {
            assert_eq!(phase.sequences.len(), SEQUENCES_PER_PHASE);
            for seq in &phase.sequences {
                assert!((1..=5).contains(&seq.len()));
                assert!(seq.iter().all(|k| phase.keys.contains(k)));
            }
        }
        assert_eq!(d.phases[0].keys.len(), 3);
    }

    #[test]
    fn test_phase_lookup() {
        let d = spawn_dream_from_seed("d");
        assert_eq!(d.phase_index_for(0.0), 0);
        assert_eq!(d.phase_index_for(0.5), 0);
        assert_eq!(d.phase_index_for(0.6), 1);
        assert_eq!(d.phase_index_for(0.95), 2);
    }

    #[test]
    fn test_serializes() {
        let d = spawn_dream_from_seed("json");
        let json = serde_json::to_string(&d).unwrap();
        let back: Dream = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
