//! Tension governor
//!
//! Owns the single clamped tension scalar. Every mutation goes through
//! `increase`, `decrease`, `set_tension` or `nudge_toward`; all of them are
//! ignored while frozen or before `init`. Listeners are called synchronously,
//! in registration order, after every successful mutation.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::seed::TensionCurve;
use crate::consts::MAX_TENSION;
use crate::sanitize;

/// Handle returned by [`TensionGovernor::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u32);

type Listener = Box<dyn FnMut(f32)>;

pub struct TensionGovernor {
    tension: f32,
    curve: Option<TensionCurve>,
    /// Difficulty feedback on the effective increase rate (>= 1)
    increase_modifier: f32,
    frozen: bool,
    /// Set when tension hits the ceiling; drained by the orchestrator
    shatter_pending: bool,
    rng: Pcg32,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u32,
}

impl std::fmt::Debug for TensionGovernor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TensionGovernor")
            .field("tension", &self.tension)
            .field("curve", &self.curve)
            .field("increase_modifier", &self.increase_modifier)
            .field("frozen", &self.frozen)
            .field("shatter_pending", &self.shatter_pending)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Default for TensionGovernor {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TensionGovernor {
    /// Create an uninitialized governor; `rng_seed` drives the rebound coin
    pub fn new(rng_seed: u64) -> Self {
        Self {
            tension: 0.0,
            curve: None,
            increase_modifier: 1.0,
            frozen: false,
            shatter_pending: false,
            rng: Pcg32::seed_from_u64(rng_seed),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    /// Reset state and install the active curve
    pub fn init(&mut self, curve: TensionCurve) {
        self.reset();
        self.curve = Some(curve);
    }

    /// Reseed the rebound coin (used on restart)
    pub fn reseed(&mut self, rng_seed: u64) {
        self.rng = Pcg32::seed_from_u64(rng_seed);
    }

    /// Zero tension and clear freeze/shatter; keeps curve and listeners
    pub fn reset(&mut self) {
        self.tension = 0.0;
        self.increase_modifier = 1.0;
        self.frozen = false;
        self.shatter_pending = false;
    }

    /// Drop curve, state and every listener
    pub fn dispose(&mut self) {
        self.reset();
        self.curve = None;
        self.listeners.clear();
    }

    pub fn tension(&self) -> f32 {
        self.tension
    }

    pub fn curve(&self) -> Option<&TensionCurve> {
        self.curve.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.curve.is_some()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn unfreeze(&mut self) {
        self.frozen = false;
    }

    pub fn increase_modifier(&self) -> f32 {
        self.increase_modifier
    }

    /// Install the difficulty feedback gain (clamped to >= 1)
    pub fn set_increase_modifier(&mut self, modifier: f32) {
        self.increase_modifier = if modifier.is_finite() {
            modifier.max(1.0)
        } else {
            1.0
        };
    }

    /// Returns true once per shatter
    pub fn take_shatter_signal(&mut self) -> bool {
        std::mem::take(&mut self.shatter_pending)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(f32) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false if the id was not registered
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Curve if mutation is currently allowed
    fn writable_curve(&self, op: &str) -> Option<TensionCurve> {
        if self.frozen {
            return None;
        }
        if self.curve.is_none() {
            log::warn!("tension {op} before init, ignored");
        }
        self.curve
    }

    fn notify(&mut self) {
        let value = self.tension;
        for (_, listener) in self.listeners.iter_mut() {
            listener(value);
        }
    }

    fn check_shatter(&mut self) {
        if self.tension >= MAX_TENSION {
            log::info!("Tension reached {MAX_TENSION}, shattering");
            self.frozen = true;
            self.shatter_pending = true;
        }
    }

    pub fn increase(&mut self, amount: f32) {
        let Some(curve) = self.writable_curve("increase") else {
            return;
        };
        let amount = sanitize(amount, 0.0, f32::MAX);
        let delta = amount * curve.increase_rate * self.increase_modifier;
        self.tension = sanitize(self.tension + delta, 0.0, MAX_TENSION);
        self.notify();
        self.check_shatter();
    }

    /// Decrease tension; returns true if an over-stabilization rebound fired
    pub fn decrease(&mut self, amount: f32, grip_strength: f32) -> bool {
        let Some(curve) = self.writable_curve("decrease") else {
            return false;
        };
        let amount = sanitize(amount, 0.0, f32::MAX);
        let grip = sanitize(grip_strength, 0.0, f32::MAX);
        let delta = amount * curve.decrease_rate * grip;
        self.tension = sanitize(self.tension - delta, 0.0, MAX_TENSION);
        self.notify();

        if self.tension < curve.over_stabilization_threshold {
            // One fresh coin per call, no memory between calls
            let roll: f32 = self.rng.random();
            if roll < curve.rebound_probability {
                self.tension = sanitize(self.tension + curve.rebound_amount, 0.0, MAX_TENSION);
                log::debug!("Over-stabilization rebound to {:.3}", self.tension);
                self.notify();
                self.check_shatter();
                return true;
            }
        }
        false
    }

    pub fn set_tension(&mut self, value: f32) {
        if self.writable_curve("set").is_none() {
            return;
        }
        self.tension = sanitize(value, 0.0, MAX_TENSION);
        self.notify();
        self.check_shatter();
    }

    /// Move a fraction `rate` (0..=1) of the way toward `target`
    pub fn nudge_toward(&mut self, target: f32, rate: f32) {
        let rate = sanitize(rate, 0.0, 1.0);
        if rate == 0.0 || self.writable_curve("nudge").is_none() {
            return;
        }
        let target = sanitize(target, 0.0, MAX_TENSION);
        let next = sanitize(self.tension + (target - self.tension) * rate, 0.0, MAX_TENSION);
        if next != self.tension {
            self.tension = next;
            self.notify();
            self.check_shatter();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn governor() -> TensionGovernor {
        let mut g = TensionGovernor::new(7);
        g.init(TensionCurve::default());
        g
    }

    #[test]
    fn test_uninitialized_is_noop() {
        let mut g = TensionGovernor::new(1);
        g.increase(0.5);
        assert!(!g.decrease(0.1, 1.0));
        g.set_tension(0.5);
        assert_eq!(g.tension(), 0.0);
    }

    #[test]
    fn test_increase_clamps_and_shatters() {
        let mut g = governor();
        g.increase(0.4);
        assert!((g.tension() - 0.4).abs() < 1e-6);
        g.increase(5.0);
        assert_eq!(g.tension(), MAX_TENSION);
        assert!(g.is_frozen());
        assert!(g.take_shatter_signal());
        assert!(!g.take_shatter_signal());

        // Frozen: everything ignored
        g.decrease(0.5, 1.0);
        g.set_tension(0.1);
        assert_eq!(g.tension(), MAX_TENSION);

        g.reset();
        assert_eq!(g.tension(), 0.0);
        assert!(!g.is_frozen());
    }

    #[test]
    fn test_increase_modifier_applies() {
        let mut g = governor();
        g.set_increase_modifier(2.0);
        g.increase(0.1);
        assert!((g.tension() - 0.2).abs() < 1e-6);
        g.set_increase_modifier(0.2);
        assert_eq!(g.increase_modifier(), 1.0);
    }

    #[test]
    fn test_set_tension_below_ceiling_does_not_shatter() {
        let mut g = governor();
        g.set_tension(0.98);
        assert!(!g.is_frozen());
        g.set_tension(0.999);
        assert!(g.is_frozen());
    }

    #[test]
    fn test_nan_inputs_are_clamped() {
        let mut g = governor();
        g.set_tension(f32::NAN);
        assert_eq!(g.tension(), 0.0);
        g.increase(f32::NAN);
        assert_eq!(g.tension(), 0.0);
        g.set_tension(0.5);
        g.decrease(0.1, f32::NAN);
        assert_eq!(g.tension(), 0.5);
    }

    #[test]
    fn test_grip_scales_decrease() {
        let mut g = governor();
        g.set_tension(0.5);
        g.decrease(0.1, 0.5);
        assert!((g.tension() - 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_listeners_in_order() {
        let mut g = governor();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = log.clone();
        let l2 = log.clone();
        let first = g.subscribe(move |t| l1.borrow_mut().push(("first", t)));
        g.subscribe(move |t| l2.borrow_mut().push(("second", t)));

        g.set_tension(0.3);
        assert_eq!(*log.borrow(), vec![("first", 0.3), ("second", 0.3)]);

        assert!(g.unsubscribe(first));
        assert!(!g.unsubscribe(first));
        g.set_tension(0.4);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(log.borrow()[2], ("second", 0.4));

        g.dispose();
        assert_eq!(g.listener_count(), 0);
    }

    #[test]
    fn test_no_rebound_at_or_above_threshold() {
        let mut g = governor();
        for _ in 0..2000 {
            g.set_tension(0.5);
            assert!(!g.decrease(0.1, 1.0));
        }
    }

    #[test]
    fn test_rebound_frequency_matches_probability() {
        let mut g = governor();
        let curve = TensionCurve::default();
        let trials = 4000;
        let mut rebounds = 0;
        for _ in 0..trials {
            g.set_tension(0.03);
            if g.decrease(0.001, 1.0) {
                rebounds += 1;
                assert!((g.tension() - (0.029 + curve.rebound_amount)).abs() < 1e-4);
            }
        }
        let observed = rebounds as f32 / trials as f32;
        assert!(
            (observed - curve.rebound_probability).abs() < 0.04,
            "observed {observed}"
        );
    }

    #[test]
    fn test_rebound_fires_at_least_once() {
        let mut g = governor();
        let fired = (0..1000).any(|_| {
            g.set_tension(0.03);
            g.decrease(0.001, 1.0)
        });
        assert!(fired);
    }

    #[test]
    fn test_nudge_toward() {
        let mut g = governor();
        g.set_tension(0.2);
        g.nudge_toward(0.6, 0.5);
        assert!((g.tension() - 0.4).abs() < 1e-6);
        g.freeze();
        g.nudge_toward(0.0, 1.0);
        assert!((g.tension() - 0.4).abs() < 1e-6);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Inc(f32),
        Dec(f32, f32),
        Set(f32),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0.0f32..10.0).prop_map(Op::Inc),
            (0.0f32..10.0, 0.0f32..3.0).prop_map(|(a, g)| Op::Dec(a, g)),
            (-5.0f32..5.0).prop_map(Op::Set),
        ]
    }

    proptest! {
        #[test]
        fn prop_tension_always_clamped(ops in proptest::collection::vec(arb_op(), 1..200)) {
            let mut g = governor();
            for op in ops {
                match op {
                    Op::Inc(a) => g.increase(a),
                    Op::Dec(a, grip) => { g.decrease(a, grip); }
                    Op::Set(v) => g.set_tension(v),
                }
                prop_assert!((0.0..=MAX_TENSION).contains(&g.tension()));
                if g.is_frozen() {
                    g.reset();
                }
            }
        }
    }
}
