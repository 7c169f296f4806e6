//! Miss/echo feedback
//!
//! A missed pattern leaves an "echo" behind for its key. At most one echo per
//! key is alive at a time; duplicates (and their penalty) are dropped. Echoes
//! expire on the simulation clock rather than wall-clock timers, so expiry
//! happens inside the same tick as everything else.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::tension::TensionGovernor;
use crate::consts::{ECHO_PENALTY, ECHO_TTL_MS};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub key: char,
    pub spawned_at_ms: f64,
    pub expires_at_ms: f64,
}

#[derive(Debug, Clone)]
pub struct EchoField {
    echoes: BTreeMap<char, Echo>,
    ttl_ms: f64,
}

impl Default for EchoField {
    fn default() -> Self {
        Self::new(ECHO_TTL_MS)
    }
}

impl EchoField {
    pub fn new(ttl_ms: f64) -> Self {
        let ttl_ms = if ttl_ms.is_finite() && ttl_ms > 0.0 {
            ttl_ms
        } else {
            log::warn!("Invalid echo ttl {ttl_ms}, using {ECHO_TTL_MS}");
            ECHO_TTL_MS
        };
        Self {
            echoes: BTreeMap::new(),
            ttl_ms,
        }
    }

    pub fn active_count(&self) -> usize {
        self.echoes.len()
    }

    pub fn is_echoing(&self, key: char) -> bool {
        self.echoes.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Echo> {
        self.echoes.values()
    }

    /// Spawn an echo for `key`. Returns false (and applies no penalty) if one
    /// is already alive.
    pub fn spawn_echo(&mut self, key: char, now_ms: f64, governor: &mut TensionGovernor) -> bool {
        if self.echoes.contains_key(&key) {
            return false;
        }
        self.echoes.insert(
            key,
            Echo {
                key,
                spawned_at_ms: now_ms,
                expires_at_ms: now_ms + self.ttl_ms,
            },
        );
        governor.increase(ECHO_PENALTY);
        log::debug!("Echo spawned for '{key}'");
        true
    }

    /// Drop every echo whose deadline has passed; returns the freed keys
    pub fn expire(&mut self, now_ms: f64) -> Vec<char> {
        let expired: Vec<char> = self
            .echoes
            .values()
            .filter(|e| e.expires_at_ms <= now_ms)
            .map(|e| e.key)
            .collect();
        for key in &expired {
            self.echoes.remove(key);
        }
        expired
    }

    pub fn dispose(&mut self) {
        self.echoes.clear();
    }
}
