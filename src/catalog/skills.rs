//! Closed skill and metric vocabulary
//!
//! Every metric the engines understand is a `Metric` variant, and every
//! skill declares which of them it measures. Payload keys that do not map
//! onto this vocabulary never reach the scoring or comparison engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Bumped whenever a metric is added, removed or re-scaled
pub const METRIC_VOCABULARY_VERSION: u32 = 1;

/// A domain of practice with its own metric vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillId {
    PublicSpeaking,
    Boxing,
    Coding,
    Cooking,
    Music,
    Business,
    Dance,
}

impl SkillId {
    pub const ALL: [SkillId; 7] = [
        SkillId::PublicSpeaking,
        SkillId::Boxing,
        SkillId::Coding,
        SkillId::Cooking,
        SkillId::Music,
        SkillId::Business,
        SkillId::Dance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillId::PublicSpeaking => "public_speaking",
            SkillId::Boxing => "boxing",
            SkillId::Coding => "coding",
            SkillId::Cooking => "cooking",
            SkillId::Music => "music",
            SkillId::Business => "business",
            SkillId::Dance => "dance",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SkillId::PublicSpeaking => "Public Speaking",
            SkillId::Boxing => "Boxing",
            SkillId::Coding => "Coding",
            SkillId::Cooking => "Cooking",
            SkillId::Music => "Music",
            SkillId::Business => "Business",
            SkillId::Dance => "Dance",
        }
    }

    /// Parse a skill name, ignoring case and separators
    /// ("Public Speaking", "public-speaking" and "public_speaking" all match)
    pub fn parse(s: &str) -> Option<Self> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|skill| skill.as_str().replace('_', "") == wanted)
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Suggestion / sub-score category
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Movement,
    Speech,
    Timing,
    Technique,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Movement,
        Category::Speech,
        Category::Timing,
        Category::Technique,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movement => "movement",
            Category::Speech => "speech",
            Category::Timing => "timing",
            Category::Technique => "technique",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

macro_rules! metrics {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Every metric known to the engines
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Metric {
            $($variant),+
        }

        impl Metric {
            pub const ALL: &'static [Metric] = &[$(Metric::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Metric::$variant => $name),+
                }
            }
        }
    };
}

metrics! {
    PostureStability => "posture_stability",
    EyeContact => "eye_contact",
    GestureCoordination => "gesture_coordination",
    SpeakingPace => "speaking_pace",
    VoiceModulation => "voice_modulation",
    PauseTiming => "pause_timing",
    EmotionalResonance => "emotional_resonance",
    FootworkPrecision => "footwork_precision",
    Balance => "balance",
    PunchTechnique => "punch_technique",
    DefensiveMovement => "defensive_movement",
    Timing => "timing",
    Coordination => "coordination",
    ProblemDecomposition => "problem_decomposition",
    CodeClarity => "code_clarity",
    DebuggingSpeed => "debugging_speed",
    ExplanationClarity => "explanation_clarity",
    KnifeSkills => "knife_skills",
    TimingPrecision => "timing_precision",
    TechniqueExecution => "technique_execution",
    Efficiency => "efficiency",
    SafetyAwareness => "safety_awareness",
    Multitasking => "multitasking",
    RhythmAccuracy => "rhythm_accuracy",
    FingerTechnique => "finger_technique",
    MusicalExpression => "musical_expression",
    TempoControl => "tempo_control",
    Dynamics => "dynamics",
    PresentationClarity => "presentation_clarity",
    Storytelling => "storytelling",
    Confidence => "confidence",
    AudienceEngagement => "audience_engagement",
    MovementPrecision => "movement_precision",
    Flexibility => "flexibility",
}

impl Metric {
    /// Look up a metric by its canonical snake_case name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == s)
    }

    /// Human-readable name ("eye_contact" -> "eye contact")
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit in which the perception pipeline reports a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricScale {
    /// Already in [0, 1]
    #[default]
    Unit,
    /// 0-100 percentage
    Percent,
    /// Speaking rate; 120-180 wpm is ideal
    WordsPerMinute,
}

impl MetricScale {
    /// Map a raw reading onto [0, 1]
    pub fn normalize(&self, raw: f64) -> f64 {
        let value = match self {
            MetricScale::Unit => raw,
            MetricScale::Percent => raw / 100.0,
            MetricScale::WordsPerMinute => {
                if (120.0..=180.0).contains(&raw) {
                    1.0
                } else if raw < 120.0 {
                    raw / 120.0
                } else {
                    1.0 - (raw - 180.0) / 100.0
                }
            }
        };
        value.clamp(0.0, 1.0)
    }
}

/// One metric as measured for a particular skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub metric: Metric,
    pub category: Category,
    /// Values below this produce an improvement suggestion
    pub target: f64,
    #[serde(default)]
    pub scale: MetricScale,
}

/// Metric vocabulary and category weighting for one skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProfile {
    pub skill: SkillId,
    pub metrics: Vec<MetricSpec>,
    /// Weights of category sub-scores in the overall score; sum to 1
    pub category_weights: BTreeMap<Category, f64>,
}

impl SkillProfile {
    pub fn spec(&self, metric: Metric) -> Option<&MetricSpec> {
        self.metrics.iter().find(|s| s.metric == metric)
    }
}

fn spec(metric: Metric, category: Category, target: f64) -> MetricSpec {
    MetricSpec { metric, category, target, scale: MetricScale::Unit }
}

fn scaled(metric: Metric, category: Category, target: f64, scale: MetricScale) -> MetricSpec {
    MetricSpec { metric, category, target, scale }
}

fn weights(pairs: &[(Category, f64)]) -> BTreeMap<Category, f64> {
    pairs.iter().copied().collect()
}

/// Built-in skill profiles
pub fn builtin_profiles() -> Vec<SkillProfile> {
    use Category::{Movement, Speech, Technique};
    use Metric::*;

    vec![
        SkillProfile {
            skill: SkillId::PublicSpeaking,
            metrics: vec![
                spec(PostureStability, Movement, 0.8),
                scaled(EyeContact, Movement, 0.8, MetricScale::Percent),
                spec(GestureCoordination, Movement, 0.7),
                scaled(SpeakingPace, Speech, 0.9, MetricScale::WordsPerMinute),
                spec(VoiceModulation, Speech, 0.75),
                spec(PauseTiming, Category::Timing, 0.7),
                spec(EmotionalResonance, Technique, 0.7),
            ],
            category_weights: weights(&[
                (Movement, 0.35),
                (Speech, 0.35),
                (Category::Timing, 0.15),
                (Technique, 0.15),
            ]),
        },
        SkillProfile {
            skill: SkillId::Boxing,
            metrics: vec![
                spec(FootworkPrecision, Movement, 0.8),
                spec(Balance, Movement, 0.8),
                spec(Coordination, Movement, 0.8),
                spec(PunchTechnique, Technique, 0.8),
                spec(DefensiveMovement, Technique, 0.75),
                spec(Metric::Timing, Category::Timing, 0.85),
            ],
            category_weights: weights(&[(Movement, 0.4), (Technique, 0.35), (Category::Timing, 0.25)]),
        },
        SkillProfile {
            skill: SkillId::Coding,
            metrics: vec![
                spec(ProblemDecomposition, Technique, 0.75),
                spec(CodeClarity, Technique, 0.75),
                spec(DebuggingSpeed, Category::Timing, 0.7),
                spec(ExplanationClarity, Speech, 0.7),
            ],
            category_weights: weights(&[(Technique, 0.6), (Category::Timing, 0.2), (Speech, 0.2)]),
        },
        SkillProfile {
            skill: SkillId::Cooking,
            metrics: vec![
                spec(KnifeSkills, Technique, 0.8),
                spec(TechniqueExecution, Technique, 0.8),
                spec(TimingPrecision, Category::Timing, 0.85),
                spec(Efficiency, Category::Timing, 0.7),
                spec(SafetyAwareness, Movement, 0.9),
                spec(Multitasking, Movement, 0.7),
            ],
            category_weights: weights(&[(Technique, 0.45), (Category::Timing, 0.3), (Movement, 0.25)]),
        },
        SkillProfile {
            skill: SkillId::Music,
            metrics: vec![
                spec(RhythmAccuracy, Category::Timing, 0.85),
                spec(TimingPrecision, Category::Timing, 0.85),
                spec(TempoControl, Category::Timing, 0.8),
                spec(FingerTechnique, Technique, 0.8),
                spec(MusicalExpression, Technique, 0.7),
                spec(Dynamics, Technique, 0.7),
            ],
            category_weights: weights(&[(Category::Timing, 0.5), (Technique, 0.5)]),
        },
        SkillProfile {
            skill: SkillId::Business,
            metrics: vec![
                spec(PresentationClarity, Speech, 0.8),
                spec(Storytelling, Speech, 0.75),
                spec(Confidence, Movement, 0.75),
                spec(AudienceEngagement, Technique, 0.7),
            ],
            category_weights: weights(&[(Speech, 0.5), (Movement, 0.2), (Technique, 0.3)]),
        },
        SkillProfile {
            skill: SkillId::Dance,
            metrics: vec![
                spec(MovementPrecision, Movement, 0.85),
                spec(Balance, Movement, 0.8),
                spec(Flexibility, Movement, 0.7),
                spec(Coordination, Movement, 0.8),
                spec(RhythmAccuracy, Category::Timing, 0.85),
            ],
            category_weights: weights(&[(Movement, 0.7), (Category::Timing, 0.3)]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_parse_ignores_case_and_separators() {
        assert_eq!(SkillId::parse("Public Speaking"), Some(SkillId::PublicSpeaking));
        assert_eq!(SkillId::parse("public-speaking"), Some(SkillId::PublicSpeaking));
        assert_eq!(SkillId::parse("BOXING"), Some(SkillId::Boxing));
        assert_eq!(SkillId::parse("juggling"), None);
    }

    #[test]
    fn test_metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(Metric::parse(metric.as_str()), Some(*metric));
            let json = serde_json::to_string(metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.as_str()));
        }
    }

    #[test]
    fn test_words_per_minute_scale() {
        let wpm = MetricScale::WordsPerMinute;
        assert_eq!(wpm.normalize(150.0), 1.0);
        assert!((wpm.normalize(60.0) - 0.5).abs() < 1e-9);
        assert!((wpm.normalize(230.0) - 0.5).abs() < 1e-9);
        assert_eq!(wpm.normalize(400.0), 0.0);
    }

    #[test]
    fn test_percent_and_unit_scales_clamp() {
        assert!((MetricScale::Percent.normalize(62.0) - 0.62).abs() < 1e-9);
        assert_eq!(MetricScale::Percent.normalize(140.0), 1.0);
        assert_eq!(MetricScale::Unit.normalize(-0.3), 0.0);
        assert_eq!(MetricScale::Unit.normalize(1.7), 1.0);
    }

    #[test]
    fn test_builtin_profiles_cover_every_skill() {
        let profiles = builtin_profiles();
        for skill in SkillId::ALL {
            assert!(profiles.iter().any(|p| p.skill == skill), "missing profile for {}", skill);
        }
    }

    #[test]
    fn test_timing_metric_and_category_are_distinct() {
        let profiles = builtin_profiles();
        let boxing = profiles.iter().find(|p| p.skill == SkillId::Boxing).unwrap();
        let timing = boxing.metrics.iter().find(|m| m.metric == Metric::Timing).unwrap();
        assert_eq!(timing.category, Category::Timing);
        assert_eq!(boxing.category_weights.get(&Category::Timing), Some(&0.25));

        let speaking = profiles.iter().find(|p| p.skill == SkillId::PublicSpeaking).unwrap();
        let pause = speaking.metrics.iter().find(|m| m.metric == Metric::PauseTiming).unwrap();
        assert_eq!(pause.category, Category::Timing);
    }
}
