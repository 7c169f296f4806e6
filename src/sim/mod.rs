//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Tick-driven only (no threads, no wall-clock timers)
//! - Seeded RNG only
//! - Stable iteration order (sorted keys)
//! - No rendering, audio or platform dependencies

pub mod boss;
pub mod difficulty;
pub mod director;
pub mod dream;
pub mod echo;
pub mod mechanics;
pub mod run;
pub mod seed;
pub mod stabilization;
pub mod tension;

pub use boss::{BossController, BossEncounter, BossEvent, BossOutcome, BossPhase, BossTrigger};
pub use difficulty::{DifficultyScaler, DifficultySnapshot, scale_factor};
pub use director::{Director, DirectorState, DirectorTransition, PerformanceTelemetry};
pub use dream::{Archetype, ArchetypeKind, Dream, EscalationPhase, spawn_dream_from_seed};
pub use echo::{Echo, EchoField};
pub use mechanics::AnalogInput;
pub use run::{DreamRun, RunSummary, SimEvent, TickInput};
pub use seed::{
    AudioParams, DifficultyConfig, EnemyTrait, SeedStream, TensionCurve, TraitSelector,
    create_stream, derive_seed_hash,
};
pub use stabilization::StabilizationTracker;
pub use tension::{ListenerId, TensionGovernor};
