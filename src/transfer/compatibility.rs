//! Transfer compatibility and recommendations
//!
//! Effectiveness of a source -> target pair is the difficulty-weighted mean
//! of its mapping strengths, with weight `1 / difficulty`. The recommendation
//! score discounts effectiveness by how many transfers into the same target
//! the user has already completed.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::journey::UserHistory;
use crate::catalog::transfers::builtin_characteristics;
use crate::catalog::{SkillId, SkillMapping, TransferGroup};
use crate::config::TransferConfig;
use crate::error::{EngineResult, ValidationError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecommendation {
    pub source_skill: SkillId,
    pub target_skill: SkillId,
    pub effectiveness: f64,
    pub recommendation_score: f64,
    /// Strongest mapping first
    pub mappings: Vec<SkillMapping>,
    pub total_hours: f64,
    pub average_difficulty: f64,
    pub estimated_weeks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityBasis {
    /// Declared component mappings
    Catalog,
    /// Coarse skill trait profiles
    Characteristics,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compatibility {
    pub source_skill: SkillId,
    pub target_skill: SkillId,
    pub score: f64,
    pub basis: CompatibilityBasis,
}

/// Aggregate strength of a set of mappings; `None` when there are none
pub fn effectiveness(mappings: &[SkillMapping]) -> Option<f64> {
    if mappings.is_empty() {
        return None;
    }
    let (weighted, weight_sum) = mappings.iter().fold((0.0, 0.0), |(acc, sum), m| {
        let w = m.difficulty_weight();
        (acc + m.strength * w, sum + w)
    });
    if weight_sum <= 0.0 {
        return None;
    }
    Some((weighted / weight_sum).clamp(0.0, 1.0))
}

/// Recommends transfers out of a user's current skills
///
/// The catalog is indexed by source skill once at construction, so a
/// request only visits the groups of the skills it names.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    by_source: HashMap<SkillId, Vec<TransferGroup>>,
    config: TransferConfig,
}

impl TransferEngine {
    pub fn new(groups: &[TransferGroup], config: TransferConfig) -> Self {
        let mut by_source: HashMap<SkillId, Vec<TransferGroup>> = HashMap::new();
        for group in groups {
            by_source.entry(group.source).or_default().push(group.clone());
        }
        Self { by_source, config }
    }

    /// Ranked recommendations for a set of source skills
    ///
    /// Targets the user already lists as a source are skipped. Pairs below
    /// the effectiveness floor are left out, not returned with a zero score.
    pub fn recommend(
        &self,
        sources: &BTreeSet<SkillId>,
        history: &UserHistory,
    ) -> Vec<TransferRecommendation> {
        let mut out = Vec::new();

        for source in sources {
            let Some(groups) = self.by_source.get(source) else {
                continue;
            };
            for group in groups {
                if sources.contains(&group.target) {
                    continue;
                }
                let Some(rec) = self.build(group, history) else {
                    continue;
                };
                if rec.effectiveness < self.config.effectiveness_floor {
                    debug!(
                        "Skipping {} -> {}: effectiveness {:.3} below floor {:.3}",
                        rec.source_skill, rec.target_skill, rec.effectiveness, self.config.effectiveness_floor
                    );
                    continue;
                }
                out.push(rec);
            }
        }

        out.sort_by(|a, b| {
            b.recommendation_score
                .partial_cmp(&a.recommendation_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.total_hours.partial_cmp(&b.total_hours).unwrap_or(Ordering::Equal))
                .then_with(|| (a.source_skill, a.target_skill).cmp(&(b.source_skill, b.target_skill)))
        });
        out.truncate(self.config.max_recommendations);
        out
    }

    /// The recommendation for one specific pair, regardless of the floor
    pub fn recommendation(
        &self,
        source: SkillId,
        target: SkillId,
        history: &UserHistory,
    ) -> EngineResult<TransferRecommendation> {
        self.group(source, target)
            .and_then(|g| self.build(g, history))
            .ok_or_else(|| {
                ValidationError::UnknownTransfer {
                    from: source.as_str().to_string(),
                    to: target.as_str().to_string(),
                }
                .into()
            })
    }

    /// How well `source` transfers to `target`
    ///
    /// Uses the declared mappings when the pair has any, otherwise a
    /// similarity of the two skills' trait profiles. `None` if neither is
    /// available.
    pub fn compatibility(&self, source: SkillId, target: SkillId) -> Option<Compatibility> {
        if let Some(score) = self.group(source, target).and_then(|g| effectiveness(&g.mappings)) {
            return Some(Compatibility {
                source_skill: source,
                target_skill: target,
                score,
                basis: CompatibilityBasis::Catalog,
            });
        }

        let a = builtin_characteristics(source)?;
        let b = builtin_characteristics(target)?;
        let sim = |x: f64, y: f64| 1.0 - (x - y).abs();
        let score = sim(a.mental, b.mental) * 0.4
            + sim(a.timing, b.timing) * 0.3
            + sim(a.coordination, b.coordination) * 0.2
            + sim(a.physical, b.physical) * 0.1;

        Some(Compatibility {
            source_skill: source,
            target_skill: target,
            score: score.clamp(0.0, 1.0),
            basis: CompatibilityBasis::Characteristics,
        })
    }

    fn group(&self, source: SkillId, target: SkillId) -> Option<&TransferGroup> {
        self.by_source.get(&source)?.iter().find(|g| g.target == target)
    }

    fn build(&self, group: &TransferGroup, history: &UserHistory) -> Option<TransferRecommendation> {
        let effectiveness = effectiveness(&group.mappings)?;

        let completed = history.completed_into(group.target);
        let novelty = self.config.novelty_decay.powi(completed as i32);
        let recommendation_score = (effectiveness * novelty).clamp(0.0, 1.0);

        let mut mappings = group.mappings.clone();
        mappings.sort_by(|a, b| b.strength.partial_cmp(&a.strength).unwrap_or(Ordering::Equal));

        let total_hours: f64 = mappings.iter().map(|m| m.estimated_hours).sum();
        let average_difficulty =
            mappings.iter().map(|m| f64::from(m.difficulty)).sum::<f64>() / mappings.len() as f64;
        let estimated_weeks = (total_hours / self.config.hours_per_week).ceil() as u32;

        Some(TransferRecommendation {
            source_skill: group.source,
            target_skill: group.target,
            effectiveness,
            recommendation_score,
            mappings,
            total_hours,
            average_difficulty,
            estimated_weeks,
        })
    }
}
