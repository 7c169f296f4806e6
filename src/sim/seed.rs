//! Seed hashing and procedural derivation
//!
//! Every derivation function builds its own [`SeedStream`] from the seed
//! hash, so each one is individually reproducible. The values a function
//! returns depend only on the seed and the order of draws *inside* that
//! function; reordering draws is a replay-breaking change.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Deterministic 32-bit hash of a seed string.
///
/// Polynomial rolling hash (`h = h * 31 + c` over UTF-16 code units, wrapping
/// at 32 bits) followed by an absolute value, so `"d"` hashes to 100.
pub fn derive_seed_hash(text: &str) -> u32 {
    let hash = text
        .encode_utf16()
        .fold(0i32, |h, c| h.wrapping_shl(5).wrapping_sub(h).wrapping_add(c as i32));
    hash.unsigned_abs()
}

/// Deterministic stream of floats in `[0, 1)`
#[derive(Debug, Clone)]
pub struct SeedStream {
    rng: Pcg32,
}

impl SeedStream {
    pub fn new(seed: u32) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(u64::from(seed)),
        }
    }

    /// Next float in `[0, 1)`
    pub fn next_f32(&mut self) -> f32 {
        self.rng.random::<f32>()
    }

    /// Uniform index in `0..len` (`len` must be non-zero)
    pub fn next_index(&mut self, len: usize) -> usize {
        ((self.next_f32() * len as f32) as usize).min(len.saturating_sub(1))
    }

    /// Uniform value in `[lo, hi)`
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + self.next_f32() * (hi - lo)
    }

    /// Multiplicative variance: `base * (1 ± spread)`
    pub fn vary(&mut self, base: f32, spread: f32) -> f32 {
        base * (1.0 + (self.next_f32() * 2.0 - 1.0) * spread)
    }
}

/// Shorthand matching the `createStream(seed)` contract
pub fn create_stream(seed: u32) -> SeedStream {
    SeedStream::new(seed)
}

/// Procedurally generate `count` pattern sequences from `alphabet`.
///
/// Each sequence is 1-5 symbols long; symbols are drawn uniformly.
pub fn derive_sequences(seed: u32, alphabet: &[char], count: usize) -> Vec<Vec<char>> {
    if alphabet.is_empty() {
        log::warn!("derive_sequences called with an empty alphabet");
        return Vec::new();
    }
    let mut stream = SeedStream::new(seed);
    (0..count)
        .map(|_| {
            let len = 1 + stream.next_index(5);
            (0..len)
                .map(|_| alphabet[stream.next_index(alphabet.len())])
                .collect()
        })
        .collect()
}

/// Enemy flavors; the thematic one for a dream is weighted 3x
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnemyTrait {
    Glitch,
    Static,
    Loop,
    Void,
    Fracture,
    Whisper,
    Mirror,
}

impl EnemyTrait {
    /// All traits in canonical order
    pub const ALL: [EnemyTrait; 7] = [
        EnemyTrait::Glitch,
        EnemyTrait::Static,
        EnemyTrait::Loop,
        EnemyTrait::Void,
        EnemyTrait::Fracture,
        EnemyTrait::Whisper,
        EnemyTrait::Mirror,
    ];
}

/// Weighted sampler over the 7 enemy traits
#[derive(Debug, Clone)]
pub struct TraitSelector {
    stream: SeedStream,
    thematic: EnemyTrait,
}

impl TraitSelector {
    const THEMATIC_WEIGHT: u32 = 3;

    pub fn thematic(&self) -> EnemyTrait {
        self.thematic
    }

    /// Relative weight of a trait in this selector
    pub fn weight_of(&self, t: EnemyTrait) -> u32 {
        if t == self.thematic {
            Self::THEMATIC_WEIGHT
        } else {
            1
        }
    }

    /// Draw the next trait
    pub fn sample(&mut self) -> EnemyTrait {
        let total: u32 = EnemyTrait::ALL.iter().map(|t| self.weight_of(*t)).sum();
        let mut roll = self.stream.next_f32() * total as f32;
        for t in EnemyTrait::ALL {
            let w = self.weight_of(t) as f32;
            if roll < w {
                return t;
            }
            roll -= w;
        }
        // Float rounding can leave the roll a hair past the last bucket
        EnemyTrait::Mirror
    }
}

pub fn derive_trait_selector(seed: u32, thematic: EnemyTrait) -> TraitSelector {
    TraitSelector {
        stream: SeedStream::new(seed),
        thematic,
    }
}

/// Synthesis parameters handed to the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    /// Drone root frequency (Hz)
    pub base_frequency: f32,
    /// Detune between voices (cents)
    pub detune: f32,
    /// Reverb wet mix at zero tension
    pub reverb_mix: f32,
    /// Low-pass cutoff at zero tension (Hz)
    pub filter_cutoff: f32,
}

pub fn derive_audio_params(seed: u32) -> AudioParams {
    let mut s = SeedStream::new(seed);
    AudioParams {
        base_frequency: s.vary(110.0, 0.15),
        detune: s.vary(12.0, 0.2),
        reverb_mix: s.vary(0.3, 0.2),
        filter_cutoff: s.vary(2400.0, 0.15),
    }
}

/// Resistance curve for the resistance-matching archetype
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResistanceProfile {
    pub stiffness: f32,
    pub damping: f32,
    pub slit_width: f32,
}

pub fn derive_resistance_profile(seed: u32) -> ResistanceProfile {
    let mut s = SeedStream::new(seed);
    ResistanceProfile {
        stiffness: s.vary(0.6, 0.2),
        damping: s.vary(0.35, 0.2),
        slit_width: s.vary(0.15, 0.2),
    }
}

/// Parameters of the tension scaling law and the bounds of every scaled output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    /// Growth coefficient `k`
    pub k: f32,
    /// Multiplier on `tension * elapsed_ms` inside the log
    pub time_scale: f32,
    /// Feedback damping, always within `[0.7, 0.9]`
    pub damping_coeff: f32,
    /// Hard cap on the tension-increase modifier
    pub max_increase_modifier: f32,
    pub spawn_interval_floor_ms: f32,
    pub enemy_cap_ceiling: u32,
    pub morph_speed_ceiling: f32,
    pub boss_threshold_floor: f32,
    pub pattern_complexity_ceiling: u32,
    pub rotation_rpm_ceiling: f32,
    pub tolerance_floor: f32,
    pub sequence_length_ceiling: u32,
    pub key_time_budget_floor_ms: f32,
    pub slam_cycles_ceiling: u32,
    pub counter_window_floor: f32,
}

pub fn derive_difficulty_config(seed: u32) -> DifficultyConfig {
    let mut s = SeedStream::new(seed);
    DifficultyConfig {
        k: s.vary(0.35, 0.15),
        time_scale: s.vary(1.0 / 60_000.0, 0.15),
        damping_coeff: s.vary(0.8, 0.125),
        max_increase_modifier: 3.0,
        spawn_interval_floor_ms: 350.0,
        enemy_cap_ceiling: 24,
        morph_speed_ceiling: 3.0,
        boss_threshold_floor: 0.55,
        pattern_complexity_ceiling: 6,
        rotation_rpm_ceiling: 18.0,
        tolerance_floor: 0.04,
        sequence_length_ceiling: 7,
        key_time_budget_floor_ms: 250.0,
        slam_cycles_ceiling: 5,
        counter_window_floor: 1.5,
    }
}

/// How tension responds to pressure and relief
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TensionCurve {
    /// Multiplier on every `increase` amount
    pub increase_rate: f32,
    /// Multiplier on every `decrease` amount
    pub decrease_rate: f32,
    /// Base amount removed by a single key hold
    pub hold_decrease: f32,
    /// Below this post-decrease tension a rebound may fire
    pub over_stabilization_threshold: f32,
    pub rebound_probability: f32,
    pub rebound_amount: f32,
}

impl Default for TensionCurve {
    fn default() -> Self {
        Self {
            increase_rate: 1.0,
            decrease_rate: 1.0,
            hold_decrease: 0.03,
            over_stabilization_threshold: 0.05,
            rebound_probability: 0.25,
            rebound_amount: 0.12,
        }
    }
}

pub fn derive_tension_curve(seed: u32) -> TensionCurve {
    let mut s = SeedStream::new(seed);
    let base = TensionCurve::default();
    TensionCurve {
        increase_rate: s.vary(base.increase_rate, 0.15),
        decrease_rate: s.vary(base.decrease_rate, 0.15),
        hold_decrease: s.vary(base.hold_decrease, 0.15),
        over_stabilization_threshold: s.vary(base.over_stabilization_threshold, 0.15),
        rebound_probability: s.vary(base.rebound_probability, 0.2),
        rebound_amount: s.vary(base.rebound_amount, 0.2),
    }
}
