//! Engine container
//!
//! All engines are built once at startup from a validated catalog and
//! configuration, then shared by reference (or `Arc`) with whatever handles
//! requests. Nothing here is mutable after construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::analysis::{compare, MetricNormalizer, MetricSnapshot, ComparisonResult, ScoreResult, ScoringEngine};
use crate::catalog::Catalog;
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::transfer::{PathGenerator, TransferEngine};

/// Everything one analysis chunk produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkAnalysis {
    pub snapshot: MetricSnapshot,
    pub score: ScoreResult,
    pub comparisons: Vec<ComparisonResult>,
}

pub struct Engines {
    pub catalog: Catalog,
    pub config: EngineConfig,
    pub normalizer: MetricNormalizer,
    pub scoring: ScoringEngine,
    pub transfer: TransferEngine,
    pub paths: PathGenerator,
}

impl Engines {
    /// Validate catalog and config, then build the engines
    ///
    /// This is the only place a miscalibrated catalog is reported; once it
    /// returns the engines never re-check reference data.
    pub fn from_catalog(catalog: Catalog, config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        catalog.validate()?;

        info!(
            "Engines ready: {} skills, {} expert patterns, {} transfer groups",
            catalog.profiles.len(),
            catalog.patterns.len(),
            catalog.transfers.len()
        );

        Ok(Self {
            normalizer: MetricNormalizer::new(&catalog.profiles, config.normalizer.default_value),
            scoring: ScoringEngine::new(&catalog.profiles),
            transfer: TransferEngine::new(&catalog.transfers, config.transfer.clone()),
            paths: PathGenerator::new(config.paths.exercise_seed),
            catalog,
            config,
        })
    }

    #[cfg(test)]
    pub fn builtin() -> EngineResult<Self> {
        Self::from_catalog(Catalog::builtin(), EngineConfig::default())
    }

    /// Compare against the catalog's patterns for the snapshot's skill
    pub fn compare(&self, snapshot: &MetricSnapshot) -> Vec<ComparisonResult> {
        compare(snapshot, &self.catalog.patterns)
    }

    /// Normalize, score and compare one raw metric payload
    pub fn analyze(&self, skill: &str, raw: &Value) -> EngineResult<ChunkAnalysis> {
        let snapshot = self.normalizer.normalize(skill, raw)?;
        let score = self.scoring.score(&snapshot);
        let comparisons = self.compare(&snapshot);
        Ok(ChunkAnalysis {
            snapshot,
            score,
            comparisons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Category;
    use crate::error::{EngineError, ValidationError};
    use serde_json::json;

    #[test]
    fn test_builtin_engines() {
        let engines = Engines::builtin().unwrap();
        let analysis = engines
            .analyze(
                "Public Speaking",
                &json!({
                    "posture_stability": 0.9,
                    "eye_contact": 72,
                    "gesture_coordination": 0.6,
                    "speaking_pace": 150,
                    "voice_modulation": 0.5,
                    "pause_timing": 0.7,
                    "emotional_resonance": 0.8
                }),
            )
            .unwrap();

        assert!(!analysis.snapshot.incomplete());
        assert!((0.0..=100.0).contains(&analysis.score.overall_score));
        assert_eq!(analysis.comparisons.len(), 4);
        assert!(analysis.score.sub_scores.contains_key(&Category::Speech));
    }

    #[test]
    fn test_miscalibrated_catalog_fails_startup() {
        let mut catalog = Catalog::builtin();
        catalog.transfers[0].mappings[0].difficulty = 9;
        let result = Engines::from_catalog(catalog, EngineConfig::default());
        assert!(matches!(result, Err(EngineError::CatalogMiscalibration(_))));
    }

    #[test]
    fn test_bad_config_fails_startup() {
        let mut config = EngineConfig::default();
        config.transfer.novelty_decay = 0.0;
        let result = Engines::from_catalog(Catalog::builtin(), config);
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[test]
    fn test_unknown_skill_is_request_error() {
        let engines = Engines::builtin().unwrap();
        let err = engines.analyze("juggling", &json!({})).unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::UnknownSkill(_))));
    }
}
