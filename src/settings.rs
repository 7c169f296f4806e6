//! Run settings
//!
//! Tunables that are not derived from the seed. Stored as JSON; missing
//! fields fall back to their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::ECHO_TTL_MS;

/// Boss phase durations (seconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BossTimings {
    pub emerge: f32,
    pub descend: f32,
    pub slam_prep: f32,
    pub impact: f32,
    pub resolve: f32,
}

impl Default for BossTimings {
    fn default() -> Self {
        Self {
            emerge: 0.6,
            descend: 2.5,
            slam_prep: 0.8,
            impact: 0.4,
            resolve: 4.0,
        }
    }
}

impl BossTimings {
    /// Replace non-positive or non-finite durations with defaults
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let fix = |v: f32, fallback: f32| if v.is_finite() && v > 0.0 { v } else { fallback };
        Self {
            emerge: fix(self.emerge, d.emerge),
            descend: fix(self.descend, d.descend),
            slam_prep: fix(self.slam_prep, d.slam_prep),
            impact: fix(self.impact, d.impact),
            resolve: fix(self.resolve, d.resolve),
        }
    }
}

/// Run-level settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How strongly the director's proposal pulls on tension (per second, 0 = off)
    pub director_blend_rate: f32,
    /// Echo lifetime (ms)
    pub echo_ttl_ms: f64,
    pub boss_timings: BossTimings,
    /// Frame delta clamp (seconds)
    pub max_frame_dt: f32,
    /// Mixed into the rebound RNG seed
    pub rebound_salt: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            director_blend_rate: 0.15,
            echo_ttl_ms: ECHO_TTL_MS,
            boss_timings: BossTimings::default(),
            max_frame_dt: 0.1,
            rebound_salt: 0x9E37_79B9,
        }
    }
}

impl Settings {
    /// Replace values that would break a running frame with defaults
    pub fn sanitized(self) -> Self {
        let d = Self::default();
        let positive = |v: f32, fallback: f32| if v.is_finite() && v > 0.0 { v } else { fallback };
        Self {
            director_blend_rate: if self.director_blend_rate.is_finite() {
                self.director_blend_rate.max(0.0)
            } else {
                d.director_blend_rate
            },
            echo_ttl_ms: if self.echo_ttl_ms.is_finite() && self.echo_ttl_ms > 0.0 {
                self.echo_ttl_ms
            } else {
                d.echo_ttl_ms
            },
            boss_timings: self.boss_timings.sanitized(),
            max_frame_dt: positive(self.max_frame_dt, d.max_frame_dt),
            rebound_salt: self.rebound_salt,
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings.sanitized())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Load from a JSON file, falling back to defaults on any problem
    pub fn load_from(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Invalid settings in {}: {e}; using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Could not read {}: {e}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Save to a JSON file
    pub fn save_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
