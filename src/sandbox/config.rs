// Sandbox configuration parsed from a TOML file.
//
// Every section has defaults, so an empty file (or no file at all) yields a
// working sandbox with the built-in archetypes and the default ground.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

use super::arena::FloorConfig;
use super::assets::{self, ModelEntry};
use super::error::ConfigError;
use super::tuning::TuningSnapshot;
use crate::engine::footstep::STEP_RATE_RANGE;
use crate::engine::gait::GaitParams;

/// Per-walker constants and the ranges randomized once at spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Max heading change in radians per second.
    pub turn_speed: f32,
    /// Half-open `[min, max)` range for a walker's base speed.
    pub base_speed: [f32; 2],
    /// Half-open `[min, max)` range for the bob frequency in Hz.
    pub hop_f: [f32; 2],
    pub hop_a: f32,
    pub tilt_a: f32,
    pub squash: f32,
    /// Gap between the top of the model and its name tag.
    pub tag_margin: f32,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            turn_speed: 3.0,
            base_speed: [0.9, 1.6],
            hop_f: [1.4, 2.0],
            hop_a: 0.22,
            tilt_a: 0.12,
            squash: 0.12,
            tag_margin: 0.22,
        }
    }
}

impl WalkerConfig {
    pub fn base_speed_range(&self) -> Range<f32> {
        self.base_speed[0]..self.base_speed[1]
    }

    pub fn hop_f_range(&self) -> Range<f32> {
        self.hop_f[0]..self.hop_f[1]
    }

    /// Gait parameters for a walker with the given bob frequency.
    pub fn gait(&self, hop_f: f32) -> GaitParams {
        GaitParams { hop_f, hop_a: self.hop_a, tilt_a: self.tilt_a, squash: self.squash }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Side length of the default square ground.
    pub ground_size: f32,
    pub ground_y: f32,
    pub floors: Vec<FloorConfig>,
    /// Name of the floor active at startup; the default ground when unset.
    pub initial_floor: Option<String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            ground_size: 24.0,
            ground_y: 0.0,
            floors: vec![
                FloorConfig { name: "Meadow".into(), size: 24.0 },
                FloorConfig { name: "Courtyard".into(), size: 16.0 },
                FloorConfig { name: "Plaza".into(), size: 34.0 },
            ],
            initial_floor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub enabled: bool,
    /// Size of the footstep variant pool.
    pub step_variants: u32,
    pub step_volume: f32,
    pub pop_volume: f32,
    /// Inclusive footstep playback-rate range.
    pub step_rate: [f32; 2],
    /// Inclusive spawn pop playback-rate range.
    pub pop_rate: [f32; 2],
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            step_variants: 3,
            step_volume: 0.7,
            pop_volume: 0.9,
            step_rate: [*STEP_RATE_RANGE.start(), *STEP_RATE_RANGE.end()],
            pop_rate: [0.9, 1.1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleConfig {
    pub count: usize,
    /// Minimum distance from an obstacle centre to the arena edge.
    pub margin: f32,
}

impl Default for ObstacleConfig {
    fn default() -> Self {
        Self { count: 0, margin: 2.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub tuning: TuningSnapshot,
    pub walker: WalkerConfig,
    pub arena: ArenaConfig,
    pub audio: AudioConfig,
    pub obstacles: ObstacleConfig,
    pub models: Vec<ModelEntry>,
    /// JSON file backing name persistence. Names live only in memory when unset.
    pub names_path: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            tuning: TuningSnapshot::default(),
            walker: WalkerConfig::default(),
            arena: ArenaConfig::default(),
            audio: AudioConfig::default(),
            obstacles: ObstacleConfig::default(),
            models: assets::builtin_models(),
            names_path: None,
            seed: None,
        }
    }
}

impl SandboxConfig {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Like `load`, but a missing path falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.models.is_empty() {
            return Err(ConfigError::Invalid("at least one model is required".into()));
        }
        for (label, [lo, hi]) in [("walker.base_speed", self.walker.base_speed), ("walker.hop_f", self.walker.hop_f)] {
            if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo < hi) {
                return Err(ConfigError::Invalid(format!("{label} must be an increasing positive range, got [{lo}, {hi}]")));
            }
        }
        for (label, [lo, hi]) in [("audio.step_rate", self.audio.step_rate), ("audio.pop_rate", self.audio.pop_rate)] {
            if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
                return Err(ConfigError::Invalid(format!("{label} must be a positive range, got [{lo}, {hi}]")));
            }
        }
        if !(self.walker.turn_speed.is_finite() && self.walker.turn_speed > 0.0) {
            return Err(ConfigError::Invalid("walker.turn_speed must be positive".into()));
        }
        if self.arena.ground_size <= 2.0 {
            return Err(ConfigError::Invalid("arena.ground_size must exceed 2".into()));
        }
        if let Some(floor) = self.arena.floors.iter().find(|f| f.size <= 2.0) {
            return Err(ConfigError::Invalid(format!("floor '{}' must be larger than 2", floor.name)));
        }
        if let Some(name) = &self.arena.initial_floor {
            if !self.arena.floors.iter().any(|f| &f.name == name) {
                return Err(ConfigError::Invalid(format!("initial floor '{name}' is not in arena.floors")));
            }
        }
        let mut keys: Vec<&str> = self.models.iter().map(|m| m.key.as_str()).collect();
        keys.sort_unstable();
        if let Some(dup) = keys.windows(2).find(|w| w[0] == w[1]) {
            return Err(ConfigError::Invalid(format!("duplicate model key '{}'", dup[0])));
        }
        Ok(())
    }
}
