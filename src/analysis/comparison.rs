//! Expert pattern comparison
//!
//! Similarity per metric is `1 - |user - expert|`; the overall similarity is
//! the weight-normalized average over the metrics both sides actually have.
//! A metric the user did not provide is left out of the average instead of
//! counting as zero.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::normalizer::MetricSnapshot;
use crate::catalog::{ExpertPattern, Metric};

/// Weight for a reference metric the pattern does not weight explicitly
const FALLBACK_WEIGHT: f64 = 0.1;
const STRENGTH_SIMILARITY: f64 = 0.8;
const IMPROVEMENT_GAP: f64 = 0.2;
const INTERMEDIATE_GAP: f64 = 0.3;

/// Signed difference `user - expert` for one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricGap {
    pub metric: Metric,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub expert_id: String,
    pub expert_name: String,
    pub overall_similarity: f64,
    pub per_metric_similarity: BTreeMap<Metric, f64>,
    /// Metrics where the user is below the expert, largest gap first
    pub gaps: Vec<MetricGap>,
    pub compared_metrics: usize,
}

/// Compare a snapshot against every pattern for the same skill
///
/// Results keep the order of `patterns`; use [`rank_matches`] for a ranking.
pub fn compare(snapshot: &MetricSnapshot, patterns: &[ExpertPattern]) -> Vec<ComparisonResult> {
    patterns
        .iter()
        .filter(|p| p.skill == snapshot.skill())
        .map(|p| compare_one(snapshot, p))
        .collect()
}

pub fn compare_one(snapshot: &MetricSnapshot, pattern: &ExpertPattern) -> ComparisonResult {
    let mut per_metric_similarity = BTreeMap::new();
    let mut gaps = Vec::new();
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;

    for (metric, expert_value) in &pattern.reference_metrics {
        // defaulted metrics were never measured
        let Some(user_value) = snapshot.measured(*metric) else {
            continue;
        };

        let similarity = (1.0 - (user_value - expert_value).abs()).clamp(0.0, 1.0);
        let weight = pattern.weights.get(metric).copied().unwrap_or(FALLBACK_WEIGHT);
        weighted += weight * similarity;
        weight_sum += weight;
        per_metric_similarity.insert(*metric, similarity);

        let delta = round_delta(user_value - expert_value);
        if delta < 0.0 {
            gaps.push(MetricGap { metric: *metric, delta });
        }
    }

    let overall_similarity = if per_metric_similarity.is_empty() {
        0.0
    } else if weight_sum > 0.0 {
        weighted / weight_sum
    } else {
        // every compared metric weighted zero
        per_metric_similarity.values().sum::<f64>() / per_metric_similarity.len() as f64
    };

    gaps.sort_by(|a, b| {
        b.delta
            .abs()
            .partial_cmp(&a.delta.abs())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.metric.as_str().cmp(b.metric.as_str()))
    });

    ComparisonResult {
        expert_id: pattern.expert_id.clone(),
        expert_name: pattern.expert_name.clone(),
        overall_similarity: overall_similarity.clamp(0.0, 1.0),
        compared_metrics: per_metric_similarity.len(),
        per_metric_similarity,
        gaps,
    }
}

fn round_delta(delta: f64) -> f64 {
    (delta * 1e9).round() / 1e9
}

/// Best matches first, ties by expert id
pub fn rank_matches(mut results: Vec<ComparisonResult>, top_n: usize) -> Vec<ComparisonResult> {
    results.sort_by(|a, b| {
        b.overall_similarity
            .partial_cmp(&a.overall_similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.expert_id.cmp(&b.expert_id))
    });
    results.truncate(top_n);
    results
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaDifficulty {
    Beginner,
    Intermediate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementArea {
    pub metric: Metric,
    /// expert - user, always positive
    pub gap: f64,
    pub difficulty: AreaDifficulty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertFeedback {
    pub expert_id: String,
    pub overall_similarity: f64,
    pub strengths: Vec<Metric>,
    pub improvement_areas: Vec<ImprovementArea>,
}

pub fn expert_feedback(result: &ComparisonResult) -> ExpertFeedback {
    let strengths = result
        .per_metric_similarity
        .iter()
        .filter(|(_, s)| **s > STRENGTH_SIMILARITY)
        .map(|(m, _)| *m)
        .collect();

    let improvement_areas = result
        .gaps
        .iter()
        .filter(|g| -g.delta > IMPROVEMENT_GAP)
        .map(|g| ImprovementArea {
            metric: g.metric,
            gap: -g.delta,
            difficulty: if -g.delta > INTERMEDIATE_GAP {
                AreaDifficulty::Intermediate
            } else {
                AreaDifficulty::Beginner
            },
        })
        .collect();

    ExpertFeedback {
        expert_id: result.expert_id.clone(),
        overall_similarity: result.overall_similarity,
        strengths,
        improvement_areas,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::normalizer::MetricNormalizer;
    use crate::catalog::experts::builtin_patterns;
    use crate::catalog::skills::builtin_profiles;
    use crate::catalog::SkillId;
    use serde_json::json;

    fn pattern(id: &str, metrics: &[(Metric, f64)], weights: &[(Metric, f64)]) -> ExpertPattern {
        ExpertPattern {
            expert_id: id.to_string(),
            expert_name: id.to_uppercase(),
            skill: SkillId::PublicSpeaking,
            reference_metrics: metrics.iter().copied().collect(),
            weights: weights.iter().copied().collect(),
        }
    }

    fn posture_pace_pattern() -> ExpertPattern {
        pattern(
            "coach",
            &[(Metric::PostureStability, 0.95), (Metric::SpeakingPace, 0.85)],
            &[(Metric::PostureStability, 0.5), (Metric::SpeakingPace, 0.5)],
        )
    }

    #[test]
    fn test_posture_and_pace_against_coach() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[(Metric::PostureStability, 0.9), (Metric::SpeakingPace, 0.4)],
        );
        let results = compare(&snapshot, &[posture_pace_pattern()]);
        assert_eq!(results.len(), 1);
        let result = &results[0];

        assert!((result.per_metric_similarity[&Metric::PostureStability] - 0.95).abs() < 1e-9);
        assert!((result.per_metric_similarity[&Metric::SpeakingPace] - 0.55).abs() < 1e-9);
        assert!((result.overall_similarity - 0.75).abs() < 1e-9);

        let order: Vec<_> = result.gaps.iter().map(|g| g.metric).collect();
        assert_eq!(order, vec![Metric::SpeakingPace, Metric::PostureStability]);
        assert!((result.gaps[0].delta + 0.45).abs() < 1e-9);
        assert!((result.gaps[1].delta + 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_missing_metric_is_not_a_zero() {
        let pattern = pattern(
            "coach",
            &[
                (Metric::PostureStability, 0.95),
                (Metric::SpeakingPace, 0.85),
                (Metric::EyeContact, 0.9),
            ],
            &[
                (Metric::PostureStability, 0.2),
                (Metric::SpeakingPace, 0.3),
                (Metric::EyeContact, 0.5),
            ],
        );
        let full = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[
                (Metric::PostureStability, 0.9),
                (Metric::SpeakingPace, 0.4),
                (Metric::EyeContact, 0.9),
            ],
        );
        let without_eye = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[(Metric::PostureStability, 0.9), (Metric::SpeakingPace, 0.4)],
        );

        let full = compare_one(&full, &pattern);
        let partial = compare_one(&without_eye, &pattern);

        // reweighted over posture and pace only: (0.2*0.95 + 0.3*0.55) / 0.5
        assert!((partial.overall_similarity - 0.71).abs() < 1e-9);
        assert_eq!(partial.compared_metrics, 2);
        assert!(!partial.per_metric_similarity.contains_key(&Metric::EyeContact));
        assert!(partial.overall_similarity < full.overall_similarity);
        assert!(partial.overall_similarity > 0.5);
    }

    #[test]
    fn test_defaulted_metrics_are_excluded() {
        let normalizer = MetricNormalizer::new(&builtin_profiles(), 0.5);
        let snapshot = normalizer
            .normalize(
                "public_speaking",
                &json!({"posture_stability": 0.9, "speaking_pace": 150}),
            )
            .unwrap();
        let result = compare_one(&snapshot, &posture_pace_pattern());
        assert_eq!(result.compared_metrics, 2);

        let mut with_eye = posture_pace_pattern();
        with_eye.reference_metrics.insert(Metric::EyeContact, 0.9);
        let result = compare_one(&snapshot, &with_eye);
        assert_eq!(result.compared_metrics, 2);
        assert!(result.gaps.iter().all(|g| g.metric != Metric::EyeContact));
    }

    #[test]
    fn test_weights_are_renormalized() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[(Metric::PostureStability, 0.9), (Metric::SpeakingPace, 0.4)],
        );
        let mut scaled = posture_pace_pattern();
        scaled.weights = [(Metric::PostureStability, 3.0), (Metric::SpeakingPace, 3.0)]
            .into_iter()
            .collect();
        let result = compare_one(&snapshot, &scaled);
        assert!((result.overall_similarity - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_unweighted_reference_metric_uses_fallback() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[(Metric::PostureStability, 1.0), (Metric::SpeakingPace, 0.5)],
        );
        let pattern = pattern(
            "coach",
            &[(Metric::PostureStability, 1.0), (Metric::SpeakingPace, 1.0)],
            &[(Metric::PostureStability, 0.3)],
        );
        let result = compare_one(&snapshot, &pattern);
        // (0.3 * 1.0 + 0.1 * 0.5) / 0.4
        assert!((result.overall_similarity - 0.875).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_comparable_scores_zero() {
        let snapshot = MetricSnapshot::from_values(SkillId::PublicSpeaking, &[(Metric::VoiceModulation, 0.7)]);
        let result = compare_one(&snapshot, &posture_pace_pattern());
        assert_eq!(result.compared_metrics, 0);
        assert_eq!(result.overall_similarity, 0.0);
        assert!(result.gaps.is_empty());
    }

    #[test]
    fn test_only_matching_skill_patterns_compared() {
        let snapshot = MetricSnapshot::from_values(SkillId::Boxing, &[(Metric::Timing, 0.9)]);
        let results = compare(&snapshot, &builtin_patterns());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].expert_id, "ali");
    }

    #[test]
    fn test_similarity_bounded_for_builtin_library() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::Music,
            &[
                (Metric::RhythmAccuracy, 0.0),
                (Metric::TimingPrecision, 1.0),
                (Metric::FingerTechnique, 0.3),
                (Metric::Dynamics, 0.6),
            ],
        );
        for result in compare(&snapshot, &builtin_patterns()) {
            assert!((0.0..=1.0).contains(&result.overall_similarity));
            assert!(result.per_metric_similarity.values().all(|s| (0.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn test_gap_ties_broken_by_metric_name() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[(Metric::SpeakingPace, 0.5), (Metric::EyeContact, 0.5)],
        );
        let pattern = pattern(
            "coach",
            &[(Metric::SpeakingPace, 0.8), (Metric::EyeContact, 0.8)],
            &[],
        );
        let result = compare_one(&snapshot, &pattern);
        let order: Vec<_> = result.gaps.iter().map(|g| g.metric).collect();
        assert_eq!(order, vec![Metric::EyeContact, Metric::SpeakingPace]);
    }

    #[test]
    fn test_rank_matches() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::PublicSpeaking,
            &[
                (Metric::VoiceModulation, 0.9),
                (Metric::EmotionalResonance, 0.95),
                (Metric::EyeContact, 0.85),
            ],
        );
        let results = compare(&snapshot, &builtin_patterns());
        assert_eq!(results.len(), 4);

        let ranked = rank_matches(results, 2);
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].overall_similarity >= ranked[1].overall_similarity);
        assert_eq!(ranked[0].expert_id, "mlk");
    }

    #[test]
    fn test_expert_feedback() {
        let snapshot = MetricSnapshot::from_values(
            SkillId::Boxing,
            &[
                (Metric::FootworkPrecision, 0.9),
                (Metric::PunchTechnique, 0.65),
                (Metric::Timing, 0.5),
            ],
        );
        let results = compare(&snapshot, &builtin_patterns());
        let feedback = expert_feedback(&results[0]);

        assert_eq!(feedback.expert_id, "ali");
        assert_eq!(feedback.strengths, vec![Metric::FootworkPrecision]);
        assert_eq!(feedback.improvement_areas.len(), 2);
        assert_eq!(feedback.improvement_areas[0].metric, Metric::Timing);
        assert_eq!(feedback.improvement_areas[0].difficulty, AreaDifficulty::Intermediate);
        assert_eq!(feedback.improvement_areas[1].metric, Metric::PunchTechnique);
        assert_eq!(feedback.improvement_areas[1].difficulty, AreaDifficulty::Beginner);
    }
}
