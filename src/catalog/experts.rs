//! Expert reference patterns
//!
//! Reference metric profiles of skilled performers. Values are already on
//! the normalized [0, 1] scale; weights need not sum to 1 (the comparator
//! re-normalizes them).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::skills::{Metric, SkillId};

/// A reference metric profile for one expert in one skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpertPattern {
    pub expert_id: String,
    #[serde(default)]
    pub expert_name: String,
    pub skill: SkillId,
    pub reference_metrics: BTreeMap<Metric, f64>,
    #[serde(default)]
    pub weights: BTreeMap<Metric, f64>,
}

struct PatternBuilder {
    pattern: ExpertPattern,
}

impl PatternBuilder {
    fn new(expert_id: &str, expert_name: &str, skill: SkillId) -> Self {
        Self {
            pattern: ExpertPattern {
                expert_id: expert_id.to_string(),
                expert_name: expert_name.to_string(),
                skill,
                reference_metrics: BTreeMap::new(),
                weights: BTreeMap::new(),
            },
        }
    }

    fn metrics(mut self, values: &[(Metric, f64)]) -> Self {
        self.pattern.reference_metrics.extend(values.iter().copied());
        self
    }

    fn weights(mut self, weights: &[(Metric, f64)]) -> Self {
        self.pattern.weights.extend(weights.iter().copied());
        self
    }

    fn build(self) -> ExpertPattern {
        self.pattern
    }
}

/// Built-in expert library
pub fn builtin_patterns() -> Vec<ExpertPattern> {
    use Metric::*;

    let speaking_weights = [
        (VoiceModulation, 0.2),
        (PauseTiming, 0.15),
        (GestureCoordination, 0.15),
        (EmotionalResonance, 0.2),
        (EyeContact, 0.15),
        (SpeakingPace, 0.15),
    ];
    let boxing_weights = [
        (FootworkPrecision, 0.2),
        (PunchTechnique, 0.25),
        (Balance, 0.15),
        (Timing, 0.2),
        (Coordination, 0.2),
        (DefensiveMovement, 0.15),
    ];
    let music_weights = [
        (RhythmAccuracy, 0.25),
        (TimingPrecision, 0.2),
        (FingerTechnique, 0.2),
        (MusicalExpression, 0.15),
        (TempoControl, 0.1),
        (Dynamics, 0.1),
    ];
    let cooking_weights = [
        (KnifeSkills, 0.25),
        (TimingPrecision, 0.2),
        (TechniqueExecution, 0.2),
        (Efficiency, 0.15),
        (SafetyAwareness, 0.1),
        (Multitasking, 0.1),
    ];
    let business_weights = [
        (PresentationClarity, 0.25),
        (Storytelling, 0.25),
        (Confidence, 0.25),
        (AudienceEngagement, 0.25),
    ];
    let dance_weights = [
        (MovementPrecision, 0.25),
        (Balance, 0.2),
        (RhythmAccuracy, 0.2),
        (Flexibility, 0.15),
        (Coordination, 0.2),
    ];

    vec![
        PatternBuilder::new("mlk", "Martin Luther King Jr.", SkillId::PublicSpeaking)
            .metrics(&[
                (VoiceModulation, 0.9),
                (PauseTiming, 0.95),
                (GestureCoordination, 0.9),
                (EmotionalResonance, 0.95),
                (EyeContact, 0.85),
                (SpeakingPace, 1.0),
            ])
            .weights(&speaking_weights)
            .build(),
        PatternBuilder::new("obama", "Barack Obama", SkillId::PublicSpeaking)
            .metrics(&[
                (VoiceModulation, 0.85),
                (PauseTiming, 0.9),
                (GestureCoordination, 0.85),
                (EmotionalResonance, 0.9),
                (EyeContact, 0.9),
                (SpeakingPace, 1.0),
            ])
            .weights(&speaking_weights)
            .build(),
        PatternBuilder::new("jobs", "Steve Jobs", SkillId::PublicSpeaking)
            .metrics(&[
                (VoiceModulation, 0.8),
                (PauseTiming, 0.85),
                (GestureCoordination, 0.95),
                (EmotionalResonance, 0.85),
                (EyeContact, 0.95),
                (SpeakingPace, 1.0),
            ])
            .weights(&speaking_weights)
            .build(),
        PatternBuilder::new("robbins", "Tony Robbins", SkillId::PublicSpeaking)
            .metrics(&[
                (VoiceModulation, 0.95),
                (PauseTiming, 0.8),
                (GestureCoordination, 0.9),
                (EmotionalResonance, 0.95),
                (EyeContact, 0.85),
                (SpeakingPace, 1.0),
            ])
            .weights(&speaking_weights)
            .build(),
        PatternBuilder::new("ali", "Muhammad Ali", SkillId::Boxing)
            .metrics(&[
                (FootworkPrecision, 0.95),
                (PunchTechnique, 0.9),
                (DefensiveMovement, 0.9),
                (Timing, 0.95),
                (Balance, 0.9),
                (Coordination, 0.95),
            ])
            .weights(&boxing_weights)
            .build(),
        PatternBuilder::new("mozart", "Wolfgang Amadeus Mozart", SkillId::Music)
            .metrics(&[
                (RhythmAccuracy, 0.98),
                (TimingPrecision, 0.95),
                (FingerTechnique, 0.95),
                (MusicalExpression, 0.95),
                (TempoControl, 0.9),
                (Dynamics, 0.95),
            ])
            .weights(&music_weights)
            .build(),
        PatternBuilder::new("beethoven", "Ludwig van Beethoven", SkillId::Music)
            .metrics(&[
                (RhythmAccuracy, 0.9),
                (TimingPrecision, 0.85),
                (FingerTechnique, 0.9),
                (MusicalExpression, 0.98),
                (TempoControl, 0.85),
                (Dynamics, 0.95),
            ])
            .weights(&music_weights)
            .build(),
        PatternBuilder::new("yo-yo-ma", "Yo-Yo Ma", SkillId::Music)
            .metrics(&[
                (RhythmAccuracy, 0.95),
                (TimingPrecision, 0.95),
                (MusicalExpression, 0.95),
                (TempoControl, 0.95),
                (Dynamics, 0.9),
            ])
            .weights(&music_weights)
            .build(),
        PatternBuilder::new("ramsay", "Gordon Ramsay", SkillId::Cooking)
            .metrics(&[
                (KnifeSkills, 0.98),
                (TimingPrecision, 0.95),
                (TechniqueExecution, 0.95),
                (Efficiency, 0.9),
                (Multitasking, 0.95),
            ])
            .weights(&cooking_weights)
            .build(),
        PatternBuilder::new("pepin", "Jacques Pepin", SkillId::Cooking)
            .metrics(&[(KnifeSkills, 0.95), (Efficiency, 0.9), (TechniqueExecution, 0.95)])
            .weights(&cooking_weights)
            .build(),
        PatternBuilder::new("buffett", "Warren Buffett", SkillId::Business)
            .metrics(&[
                (PresentationClarity, 0.95),
                (Storytelling, 0.9),
                (Confidence, 0.9),
                (AudienceEngagement, 0.85),
            ])
            .weights(&business_weights)
            .build(),
        PatternBuilder::new("winfrey", "Oprah Winfrey", SkillId::Business)
            .metrics(&[(Storytelling, 0.95), (Confidence, 0.9), (AudienceEngagement, 0.98)])
            .weights(&business_weights)
            .build(),
        PatternBuilder::new("baryshnikov", "Mikhail Baryshnikov", SkillId::Dance)
            .metrics(&[
                (MovementPrecision, 0.98),
                (Balance, 0.95),
                (Flexibility, 0.95),
                (RhythmAccuracy, 0.9),
            ])
            .weights(&dance_weights)
            .build(),
    ]
}
