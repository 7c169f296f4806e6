//! Stabilization tracker
//!
//! Tracks which keys are currently held. Every new hold relieves some
//! tension; holding the whole required set of the active phase grants the
//! coherence bonus once, re-armed when a required key is released or the
//! phase changes.

use std::collections::BTreeSet;

use super::seed::TensionCurve;
use super::tension::TensionGovernor;
use crate::consts::COHERENCE_BONUS;

/// What a single `hold_key` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoldOutcome {
    /// False when the key was already held (no-op)
    pub accepted: bool,
    pub coherence: bool,
    pub rebound: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StabilizationTracker {
    active: BTreeSet<char>,
    required: Vec<char>,
    coherence_granted: bool,
}

impl StabilizationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys held right now, in sorted order
    pub fn active_keys(&self) -> impl Iterator<Item = char> + '_ {
        self.active.iter().copied()
    }

    pub fn is_held(&self, key: char) -> bool {
        self.active.contains(&key)
    }

    pub fn required(&self) -> &[char] {
        &self.required
    }

    /// Install the active phase's required keys; re-arms coherence on change
    pub fn set_required(&mut self, keys: &[char]) {
        if self.required != keys {
            self.required = keys.to_vec();
            self.coherence_granted = false;
        }
    }

    /// True if every required key is currently held
    pub fn is_coherent(&self) -> bool {
        !self.required.is_empty() && self.required.iter().all(|k| self.active.contains(k))
    }

    pub fn hold_key(
        &mut self,
        key: char,
        grip_strength: f32,
        curve: &TensionCurve,
        governor: &mut TensionGovernor,
    ) -> HoldOutcome {
        if !self.active.insert(key) {
            return HoldOutcome::default();
        }
        let mut outcome = HoldOutcome {
            accepted: true,
            ..Default::default()
        };
        outcome.rebound |= governor.decrease(curve.hold_decrease, grip_strength);

        if !self.coherence_granted && self.is_coherent() {
            self.coherence_granted = true;
            outcome.coherence = true;
            outcome.rebound |= governor.decrease(COHERENCE_BONUS, 1.0);
            log::debug!("Coherent match on {:?}", self.required);
        }
        outcome
    }

    /// Returns false if the key was not held
    pub fn release_key(&mut self, key: char) -> bool {
        let removed = self.active.remove(&key);
        if removed && self.required.contains(&key) {
            self.coherence_granted = false;
        }
        removed
    }

    /// Clear all holds (dream change or restart)
    pub fn dispose(&mut self) {
        self.active.clear();
        self.required.clear();
        self.coherence_granted = false;
    }
}
