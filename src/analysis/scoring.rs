//! Performance scoring and improvement suggestions
//!
//! Sub-scores are category means on a 0-100 scale; the overall score is
//! their weighted sum using the skill's category weights. Every measured
//! metric below its target yields exactly one suggestion.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::normalizer::MetricSnapshot;
use crate::catalog::{Category, Metric, SkillId, SkillProfile};

/// Score reported when nothing in the snapshot can be scored
const NEUTRAL_SCORE: f64 = 50.0;
const HIGH_PRIORITY_GAP: f64 = 0.3;
const MEDIUM_PRIORITY_GAP: f64 = 0.15;
/// Confidence multiplier when the snapshot had missing metrics
const INCOMPLETE_PENALTY: f64 = 0.8;
/// Confidence ceiling for suggestions about defaulted metrics
const DEFAULTED_CONFIDENCE_CAP: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort key: high first
    fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    fn from_gap(gap: f64) -> Self {
        if gap > HIGH_PRIORITY_GAP {
            Priority::High
        } else if gap >= MEDIUM_PRIORITY_GAP {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

/// An actionable improvement hint for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub metric: Metric,
    pub category: Category,
    pub priority: Priority,
    pub confidence: f64,
    pub text: String,
    /// Set only through user feedback
    pub implemented: bool,
}

impl Suggestion {
    pub fn mark_implemented(&mut self) {
        self.implemented = true;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub skill: SkillId,
    /// 0-100
    pub overall_score: f64,
    pub sub_scores: BTreeMap<Category, f64>,
    pub suggestions: Vec<Suggestion>,
    pub incomplete: bool,
}

impl ScoreResult {
    /// Record user feedback that the suggestion for `metric` was acted on
    ///
    /// Returns false when no suggestion targets that metric.
    pub fn mark_implemented(&mut self, metric: Metric) -> bool {
        let mut found = false;
        for suggestion in self.suggestions.iter_mut().filter(|s| s.metric == metric) {
            suggestion.mark_implemented();
            found = true;
        }
        found
    }
}

/// Scores snapshots against skill profiles
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    profiles: HashMap<SkillId, SkillProfile>,
}

impl ScoringEngine {
    pub fn new(profiles: &[SkillProfile]) -> Self {
        Self {
            profiles: profiles.iter().map(|p| (p.skill, p.clone())).collect(),
        }
    }

    /// Score a snapshot. Never fails: degenerate snapshots score neutral
    pub fn score(&self, snapshot: &MetricSnapshot) -> ScoreResult {
        let Some(profile) = self.profiles.get(&snapshot.skill()) else {
            return ScoreResult {
                skill: snapshot.skill(),
                overall_score: NEUTRAL_SCORE,
                sub_scores: BTreeMap::new(),
                suggestions: Vec::new(),
                incomplete: snapshot.incomplete(),
            };
        };

        let sub_scores = sub_scores(profile, snapshot);
        let overall_score = overall_score(profile, &sub_scores);
        let suggestions = suggestions(profile, snapshot);

        ScoreResult {
            skill: snapshot.skill(),
            overall_score,
            sub_scores,
            suggestions,
            incomplete: snapshot.incomplete(),
        }
    }
}

fn sub_scores(profile: &SkillProfile, snapshot: &MetricSnapshot) -> BTreeMap<Category, f64> {
    let mut by_category: BTreeMap<Category, Vec<f64>> = BTreeMap::new();
    for spec in &profile.metrics {
        if let Some(reading) = snapshot.reading(spec.metric) {
            by_category.entry(spec.category).or_default().push(reading.value);
        }
    }

    by_category
        .into_iter()
        .map(|(category, values)| {
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            (category, (mean * 100.0).clamp(0.0, 100.0))
        })
        .collect()
}

fn overall_score(profile: &SkillProfile, sub_scores: &BTreeMap<Category, f64>) -> f64 {
    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (category, score) in sub_scores {
        let weight = profile.category_weights.get(category).copied().unwrap_or(0.0);
        weighted += weight * score;
        weight_sum += weight;
    }

    if weight_sum <= 0.0 {
        return NEUTRAL_SCORE;
    }
    // weight_sum is 1 for a full snapshot; re-normalize when categories are absent
    (weighted / weight_sum).clamp(0.0, 100.0)
}

fn suggestions(profile: &SkillProfile, snapshot: &MetricSnapshot) -> Vec<Suggestion> {
    let mut out = Vec::new();

    for spec in &profile.metrics {
        let Some(reading) = snapshot.reading(spec.metric) else {
            continue;
        };
        // rounded so that e.g. 0.8 - 0.5 classifies as exactly 0.3
        let gap = ((spec.target - reading.value) * 1e9).round() / 1e9;
        if gap <= 0.0 {
            continue;
        }

        let defaulted = snapshot.is_defaulted(spec.metric);
        let mut confidence = gap_confidence(gap).min(sample_cap(reading.samples));
        if snapshot.incomplete() {
            confidence *= INCOMPLETE_PENALTY;
        }
        let priority = if defaulted {
            confidence = confidence.min(DEFAULTED_CONFIDENCE_CAP);
            Priority::Low
        } else {
            Priority::from_gap(gap)
        };

        out.push(Suggestion {
            metric: spec.metric,
            category: spec.category,
            priority,
            confidence: confidence.clamp(0.0, 1.0),
            text: suggestion_text(spec.metric, reading.value, spec.target),
            implemented: false,
        });
    }

    out.sort_by(|a, b| {
        a.priority
            .rank()
            .cmp(&b.priority.rank())
            .then_with(|| b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal))
            .then_with(|| a.metric.as_str().cmp(b.metric.as_str()))
    });
    out
}

/// Larger gaps are clearer signals
fn gap_confidence(gap: f64) -> f64 {
    if gap > 0.2 {
        0.95
    } else if gap > 0.1 {
        0.85
    } else if gap > 0.05 {
        0.75
    } else {
        0.65
    }
}

/// Confidence ceiling by number of contributing samples
fn sample_cap(samples: u32) -> f64 {
    match samples {
        0 => 0.5,
        1 => 0.75,
        n => (0.75 + 0.05 * f64::from(n - 1)).min(1.0),
    }
}

fn suggestion_text(metric: Metric, value: f64, target: f64) -> String {
    use Metric::*;

    let advice = match metric {
        PostureStability => "Stand with your feet shoulder-width apart for better stability.",
        EyeContact => "Increase eye contact with your audience, holding each section for 3-5 seconds.",
        GestureCoordination => "Coordinate your hand gestures with your key points.",
        SpeakingPace => "Adjust your speaking pace toward 130-150 words per minute.",
        VoiceModulation => "Vary your tone and pitch; listen back for monotone sections.",
        PauseTiming => "Add strategic pauses between key points.",
        EmotionalResonance => "Connect your message to a story your audience can feel.",
        FootworkPrecision => "Focus on balance and weight distribution while moving your feet.",
        Balance => "Keep your center of gravity low and your stance stable.",
        PunchTechnique => "Break each punch into steps and drill them slowly before combining.",
        DefensiveMovement => "Practice slips and blocks until they become automatic.",
        Timing | TimingPrecision => "Work with a metronome or timer to tighten your timing.",
        Coordination => "Drill slow, deliberate combinations to build coordination.",
        ProblemDecomposition => "Split problems into smaller steps before starting.",
        CodeClarity => "Name things for what they do and keep functions short.",
        DebuggingSpeed => "Reproduce the failure first, then bisect toward the cause.",
        ExplanationClarity => "Explain your approach out loud before you write it down.",
        KnifeSkills => "Focus on grip, posture and a consistent cutting motion.",
        TechniqueExecution => "Break the technique into components and practice each slowly.",
        Efficiency => "Prepare and arrange everything before you start.",
        SafetyAwareness => "Keep your workstation clear and your guiding hand protected.",
        Multitasking => "Sequence tasks so waiting time overlaps with active work.",
        RhythmAccuracy => "Stay in sync with the beat; practice with a metronome.",
        FingerTechnique => "Pay attention to hand position and finger placement.",
        MusicalExpression => "Shape each phrase deliberately instead of playing it flat.",
        TempoControl => "Hold a steady tempo through transitions.",
        Dynamics => "Exaggerate contrasts between loud and soft passages.",
        PresentationClarity => "Lead with the key message and cut supporting detail.",
        Storytelling => "Structure your points as a story with a clear arc.",
        Confidence => "Slow down and hold still at the moments that matter.",
        AudienceEngagement => "Ask questions and react to audience responses.",
        MovementPrecision => "Control each movement from start to finish.",
        Flexibility => "Add daily mobility work to extend your range of motion.",
    };

    format!(
        "{} Current {}: {:.0}%, target: {:.0}%.",
        advice,
        metric.label(),
        value * 100.0,
        target * 100.0
    )
}
