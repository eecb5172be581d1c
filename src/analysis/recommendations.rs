//! Grouped expert recommendations
//!
//! Besides the plain similarity ranking, experts are grouped by how they
//! relate to the user's current level: peers, next-level targets, masters
//! and specialists in the user's weak metrics. Each group carries a weight;
//! an expert that lands in several groups keeps its best weighted score.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::comparison::{compare_one, ComparisonResult};
use super::normalizer::MetricSnapshot;
use crate::catalog::{ExpertPattern, Metric};

const SIMILAR_LEVEL_RANGE: f64 = 0.2;
const ASPIRATIONAL_LEVEL: f64 = 0.85;
const PROGRESSIVE_MIN: f64 = 0.1;
const PROGRESSIVE_MAX: f64 = 0.3;
const WEAK_METRIC: f64 = 0.6;
const EXPERT_STRONG: f64 = 0.8;
const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserLevel {
    Beginner,
    BeginnerPlus,
    Intermediate,
    Advanced,
}

impl UserLevel {
    /// Level from the mean of the user's measured metrics
    pub fn from_average(average: f64) -> Self {
        if average >= 0.8 {
            UserLevel::Advanced
        } else if average >= 0.6 {
            UserLevel::Intermediate
        } else if average >= 0.4 {
            UserLevel::BeginnerPlus
        } else {
            UserLevel::Beginner
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStrategy {
    /// Overall level within 0.2 of the user
    SimilarLevel,
    /// Master-level performers
    Aspirational,
    /// 0.1 to 0.3 above the user
    Progressive,
    /// Strong where the user is weak
    ImprovementFocused,
}

impl RecommendationStrategy {
    pub fn weight(&self) -> f64 {
        match self {
            RecommendationStrategy::SimilarLevel => 0.4,
            RecommendationStrategy::Aspirational => 0.3,
            RecommendationStrategy::Progressive => 0.2,
            RecommendationStrategy::ImprovementFocused => 0.1,
        }
    }

    fn limit(&self) -> usize {
        match self {
            RecommendationStrategy::SimilarLevel => 3,
            _ => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertRecommendation {
    pub expert_id: String,
    pub expert_name: String,
    pub strategy: RecommendationStrategy,
    pub reason: String,
    /// Score within the strategy's group
    pub strategy_score: f64,
    /// `strategy_score` times the strategy weight
    pub final_score: f64,
    pub overall_similarity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningApproach {
    Sequential,
    Comparative,
    Targeted,
}

/// Experts meant to be studied together
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertCombination {
    pub approach: LearningApproach,
    pub title: String,
    pub expert_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertRecommendations {
    /// None when no metric was measured
    pub level: Option<UserLevel>,
    pub user_average: Option<f64>,
    /// Measured metrics below 0.6, weakest first
    pub focus_areas: Vec<Metric>,
    pub recommendations: Vec<ExpertRecommendation>,
    pub combinations: Vec<ExpertCombination>,
}

struct Candidate<'a> {
    pattern: &'a ExpertPattern,
    comparison: ComparisonResult,
    average: f64,
}

/// Group the snapshot skill's experts by strategy and keep the best `max`
pub fn recommend_experts(
    snapshot: &MetricSnapshot,
    patterns: &[ExpertPattern],
    max: usize,
) -> ExpertRecommendations {
    let user: BTreeMap<Metric, f64> = snapshot.measured_metrics().collect();
    let user_average = mean(user.values().copied());

    let mut weak: Vec<(Metric, f64)> = user
        .iter()
        .filter(|(_, v)| **v < WEAK_METRIC)
        .map(|(m, v)| (*m, *v))
        .collect();
    weak.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

    let candidates: Vec<Candidate> = patterns
        .iter()
        .filter(|p| p.skill == snapshot.skill())
        .filter_map(|pattern| {
            Some(Candidate {
                average: mean(pattern.reference_metrics.values().copied())?,
                comparison: compare_one(snapshot, pattern),
                pattern,
            })
        })
        .collect();

    let mut grouped = Vec::new();
    if let Some(user_avg) = user_average {
        grouped.extend(group(RecommendationStrategy::SimilarLevel, &candidates, |c| {
            let diff = (c.average - user_avg).abs();
            (diff <= SIMILAR_LEVEL_RANGE + TOLERANCE).then(|| {
                (1.0 - diff, format!("Similar overall level ({:.2} vs {:.2})", c.average, user_avg))
            })
        }));
        grouped.extend(group(RecommendationStrategy::Progressive, &candidates, |c| {
            let lead = c.average - user_avg;
            (lead >= PROGRESSIVE_MIN - TOLERANCE && lead <= PROGRESSIVE_MAX + TOLERANCE)
                .then(|| (lead, format!("Next level target (+{:.2})", lead)))
        }));
    }
    grouped.extend(group(RecommendationStrategy::Aspirational, &candidates, |c| {
        (c.average >= ASPIRATIONAL_LEVEL - TOLERANCE)
            .then(|| (c.average, format!("Master-level performance to aspire to ({:.2})", c.average)))
    }));
    grouped.extend(group(RecommendationStrategy::ImprovementFocused, &candidates, |c| {
        let gains: Vec<f64> = weak
            .iter()
            .filter_map(|(metric, user_value)| {
                let expert_value = *c.pattern.reference_metrics.get(metric)?;
                (expert_value > EXPERT_STRONG).then_some(expert_value - user_value)
            })
            .collect();
        let gain = mean(gains.iter().copied())?;
        Some((
            gain,
            format!("Strong in {} of your improvement areas (avg +{:.2})", gains.len(), gain),
        ))
    }));

    let mut best: BTreeMap<String, ExpertRecommendation> = BTreeMap::new();
    for rec in grouped {
        match best.get(&rec.expert_id) {
            Some(existing) if existing.final_score >= rec.final_score => {}
            _ => {
                best.insert(rec.expert_id.clone(), rec);
            }
        }
    }
    let mut recommendations: Vec<ExpertRecommendation> = best.into_values().collect();
    recommendations.sort_by(|a, b| {
        b.final_score
            .partial_cmp(&a.final_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.expert_id.cmp(&b.expert_id))
    });
    recommendations.truncate(max);

    ExpertRecommendations {
        level: user_average.map(UserLevel::from_average),
        user_average,
        focus_areas: weak.iter().map(|(m, _)| *m).collect(),
        recommendations,
        combinations: combinations(&candidates, &weak),
    }
}

fn group<F>(strategy: RecommendationStrategy, candidates: &[Candidate], score: F) -> Vec<ExpertRecommendation>
where
    F: Fn(&Candidate) -> Option<(f64, String)>,
{
    let mut recs: Vec<ExpertRecommendation> = candidates
        .iter()
        .filter_map(|c| {
            let (strategy_score, reason) = score(c)?;
            Some(ExpertRecommendation {
                expert_id: c.pattern.expert_id.clone(),
                expert_name: c.pattern.expert_name.clone(),
                strategy,
                reason,
                strategy_score,
                final_score: strategy_score * strategy.weight(),
                overall_similarity: c.comparison.overall_similarity,
            })
        })
        .collect();
    recs.sort_by(|a, b| {
        b.strategy_score
            .partial_cmp(&a.strategy_score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.expert_id.cmp(&b.expert_id))
    });
    recs.truncate(strategy.limit());
    recs
}

fn combinations(candidates: &[Candidate], weak: &[(Metric, f64)]) -> Vec<ExpertCombination> {
    let mut combos = Vec::new();

    // closest match for fundamentals, then the strongest other expert
    let fundamentals = candidates.iter().max_by(|a, b| {
        a.comparison
            .overall_similarity
            .partial_cmp(&b.comparison.overall_similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.pattern.expert_id.cmp(&a.pattern.expert_id))
    });
    if let Some(first) = fundamentals {
        let advanced = candidates
            .iter()
            .filter(|c| c.pattern.expert_id != first.pattern.expert_id)
            .max_by(|a, b| {
                a.average
                    .partial_cmp(&b.average)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.pattern.expert_id.cmp(&a.pattern.expert_id))
            });
        if let Some(second) = advanced {
            combos.push(ExpertCombination {
                approach: LearningApproach::Sequential,
                title: "Fundamentals + Advanced Techniques".to_string(),
                expert_ids: vec![first.pattern.expert_id.clone(), second.pattern.expert_id.clone()],
            });
        }
    }

    let mut contrast: Option<(f64, &Candidate, &Candidate)> = None;
    for (i, a) in candidates.iter().enumerate() {
        for b in &candidates[i + 1..] {
            let Some(distance) = style_distance(a.pattern, b.pattern) else {
                continue;
            };
            if contrast.map_or(true, |(best, _, _)| distance > best) {
                contrast = Some((distance, a, b));
            }
        }
    }
    if let Some((_, a, b)) = contrast {
        combos.push(ExpertCombination {
            approach: LearningApproach::Comparative,
            title: "Different Style Approaches".to_string(),
            expert_ids: vec![a.pattern.expert_id.clone(), b.pattern.expert_id.clone()],
        });
    }

    let mut leaders: Vec<String> = Vec::new();
    for (metric, _) in weak {
        let leader = candidates
            .iter()
            .filter_map(|c| c.pattern.reference_metrics.get(metric).map(|v| (*v, c)))
            .max_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.1.pattern.expert_id.cmp(&a.1.pattern.expert_id))
            });
        if let Some((_, c)) = leader {
            if !leaders.contains(&c.pattern.expert_id) {
                leaders.push(c.pattern.expert_id.clone());
            }
        }
        if leaders.len() == 2 {
            break;
        }
    }
    if !leaders.is_empty() {
        combos.push(ExpertCombination {
            approach: LearningApproach::Targeted,
            title: "Weakness-Focused Learning".to_string(),
            expert_ids: leaders,
        });
    }

    combos
}

/// Mean absolute difference over the metrics both experts define
fn style_distance(a: &ExpertPattern, b: &ExpertPattern) -> Option<f64> {
    mean(
        a.reference_metrics
            .iter()
            .filter_map(|(metric, av)| b.reference_metrics.get(metric).map(|bv| (av - bv).abs())),
    )
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
