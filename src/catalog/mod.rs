//! Reference catalog
//!
//! Skill profiles, expert patterns and transfer mappings. The catalog is
//! static reference data: it is loaded (built-in or from a JSON file) and
//! validated once at startup, then handed to the engines by reference.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::info;

use crate::error::{EngineError, EngineResult};

pub mod experts;
pub mod skills;
pub mod transfers;

pub use experts::ExpertPattern;
pub use skills::{Category, Metric, SkillId, SkillProfile, METRIC_VOCABULARY_VERSION};
pub use transfers::{SkillMapping, TransferGroup};

/// Tolerance when checking that category weights sum to 1
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub profiles: Vec<SkillProfile>,
    #[serde(default)]
    pub patterns: Vec<ExpertPattern>,
    #[serde(default)]
    pub transfers: Vec<TransferGroup>,
}

impl Catalog {
    /// The catalog shipped with the binary
    pub fn builtin() -> Self {
        Self {
            profiles: skills::builtin_profiles(),
            patterns: experts::builtin_patterns(),
            transfers: transfers::builtin_groups(),
        }
    }

    /// Load and validate a catalog from a JSON file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&content)?;
        catalog.validate()?;
        info!(
            "Loaded catalog from {:?}: {} profiles, {} patterns, {} transfer groups",
            path,
            catalog.profiles.len(),
            catalog.patterns.len(),
            catalog.transfers.len()
        );
        Ok(catalog)
    }

    pub fn profile(&self, skill: SkillId) -> Option<&SkillProfile> {
        self.profiles.iter().find(|p| p.skill == skill)
    }

    pub fn patterns_for(&self, skill: SkillId) -> Vec<&ExpertPattern> {
        self.patterns.iter().filter(|p| p.skill == skill).collect()
    }

    /// Check calibration of all reference data
    ///
    /// Anything reported here is a startup failure; the engines assume a
    /// validated catalog and never re-check at request time.
    pub fn validate(&self) -> EngineResult<()> {
        let mut seen_skills = HashSet::new();
        for profile in &self.profiles {
            if !seen_skills.insert(profile.skill) {
                return Err(miscalibrated(format!("duplicate profile for {}", profile.skill)));
            }
            validate_profile(profile)?;
        }

        for pattern in &self.patterns {
            let profile = self.profile(pattern.skill).ok_or_else(|| {
                miscalibrated(format!(
                    "expert '{}' references {} which has no profile",
                    pattern.expert_id, pattern.skill
                ))
            })?;
            validate_pattern(pattern, profile)?;
        }

        let mut seen_pairs = HashSet::new();
        for group in &self.transfers {
            if group.source == group.target {
                return Err(miscalibrated(format!("transfer from {} to itself", group.source)));
            }
            if !seen_pairs.insert((group.source, group.target)) {
                return Err(miscalibrated(format!(
                    "duplicate transfer group {} -> {}",
                    group.source, group.target
                )));
            }
            for mapping in &group.mappings {
                validate_mapping(group, mapping)?;
            }
        }

        Ok(())
    }
}

fn miscalibrated(msg: String) -> EngineError {
    EngineError::CatalogMiscalibration(msg)
}

fn validate_profile(profile: &SkillProfile) -> EngineResult<()> {
    let skill = profile.skill;

    let mut sum = 0.0;
    for (category, weight) in &profile.category_weights {
        if *weight < 0.0 {
            return Err(miscalibrated(format!(
                "{}: negative weight {} for {}",
                skill,
                weight,
                category.as_str()
            )));
        }
        sum += weight;
    }
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(miscalibrated(format!(
            "{}: category weights sum to {:.6}, expected 1",
            skill, sum
        )));
    }

    let mut metrics = BTreeSet::new();
    for spec in &profile.metrics {
        if !metrics.insert(spec.metric) {
            return Err(miscalibrated(format!("{}: metric {} listed twice", skill, spec.metric)));
        }
        if !(0.0..=1.0).contains(&spec.target) {
            return Err(miscalibrated(format!(
                "{}: target {} for {} outside [0, 1]",
                skill, spec.target, spec.metric
            )));
        }
    }

    for (category, weight) in &profile.category_weights {
        if *weight > 0.0 && !profile.metrics.iter().any(|s| s.category == *category) {
            return Err(miscalibrated(format!(
                "{}: category {} is weighted but has no metrics",
                skill,
                category.as_str()
            )));
        }
    }

    Ok(())
}

fn validate_pattern(pattern: &ExpertPattern, profile: &SkillProfile) -> EngineResult<()> {
    for (metric, value) in &pattern.reference_metrics {
        if profile.spec(*metric).is_none() {
            return Err(miscalibrated(format!(
                "expert '{}': {} is not measured for {}",
                pattern.expert_id, metric, pattern.skill
            )));
        }
        if !(0.0..=1.0).contains(value) {
            return Err(miscalibrated(format!(
                "expert '{}': reference {} = {} outside [0, 1]",
                pattern.expert_id, metric, value
            )));
        }
    }
    if let Some((metric, weight)) = pattern.weights.iter().find(|(_, w)| **w < 0.0) {
        return Err(miscalibrated(format!(
            "expert '{}': negative weight {} for {}",
            pattern.expert_id, weight, metric
        )));
    }
    Ok(())
}

fn validate_mapping(group: &TransferGroup, mapping: &SkillMapping) -> EngineResult<()> {
    let pair = format!(
        "{} -> {} ({} -> {})",
        group.source, group.target, mapping.source_component, mapping.target_component
    );
    if !(1..=5).contains(&mapping.difficulty) {
        return Err(miscalibrated(format!(
            "{}: difficulty {} outside [1, 5]",
            pair, mapping.difficulty
        )));
    }
    if !(0.0..=1.0).contains(&mapping.strength) {
        return Err(miscalibrated(format!(
            "{}: strength {} outside [0, 1]",
            pair, mapping.strength
        )));
    }
    if !(mapping.estimated_hours > 0.0) {
        return Err(miscalibrated(format!(
            "{}: estimated hours must be positive, got {}",
            pair, mapping.estimated_hours
        )));
    }
    Ok(())
}
