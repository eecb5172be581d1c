//! Engine configuration
//!
//! Loaded from `config.toml` in the data directory. Every section is
//! optional; missing keys fall back to the defaults below.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub normalizer: NormalizerConfig,
    pub transfer: TransferConfig,
    pub paths: PathConfig,
    pub progress: ProgressConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Value substituted for required metrics missing from a payload
    pub default_value: f64,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self { default_value: 0.5 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Pairs whose effectiveness falls below this are not recommended
    pub effectiveness_floor: f64,
    /// Multiplier applied once per completed transfer into the same target
    pub novelty_decay: f64,
    pub max_recommendations: usize,
    pub hours_per_week: f64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            effectiveness_floor: 0.3,
            novelty_decay: 0.75,
            max_recommendations: 5,
            hours_per_week: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub exercise_seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    pub default_window_days: u32,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self { default_window_days: 30 }
    }
}

pub const DEFAULT_CONFIG_TOML: &str = r#"# SkillMirror Configuration

[normalizer]
# Value used for required metrics missing from an incoming payload
default_value = 0.5

[transfer]
# Minimum difficulty-weighted effectiveness for a transfer to be recommended
effectiveness_floor = 0.3
# Score multiplier per completed transfer into the same target skill
novelty_decay = 0.75
# Maximum recommendations returned per request
max_recommendations = 5
# Practice hours per week used for week estimates
hours_per_week = 10.0

[paths]
# Seed for exercise synthesis (same seed, same exercises)
exercise_seed = 0

[progress]
# Window used by `progress summary` when --days is not given
default_window_days = 30
"#;

impl EngineConfig {
    /// Load configuration from file, defaults if the file does not exist
    pub fn load(config_path: &Path) -> EngineResult<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: EngineConfig =
            toml::from_str(&content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        let n = &self.normalizer;
        if !(0.0..=1.0).contains(&n.default_value) {
            return Err(EngineError::Config(format!(
                "normalizer.default_value must be in [0, 1], got {}",
                n.default_value
            )));
        }

        let t = &self.transfer;
        if !(0.0..=1.0).contains(&t.effectiveness_floor) {
            return Err(EngineError::Config(format!(
                "transfer.effectiveness_floor must be in [0, 1], got {}",
                t.effectiveness_floor
            )));
        }
        if !(t.novelty_decay > 0.0 && t.novelty_decay <= 1.0) {
            return Err(EngineError::Config(format!(
                "transfer.novelty_decay must be in (0, 1], got {}",
                t.novelty_decay
            )));
        }
        if t.hours_per_week <= 0.0 {
            return Err(EngineError::Config(format!(
                "transfer.hours_per_week must be positive, got {}",
                t.hours_per_week
            )));
        }

        Ok(())
    }
}
