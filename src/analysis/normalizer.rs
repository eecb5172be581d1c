//! Metric normalization
//!
//! Turns the loosely-typed metric map produced by the perception pipeline
//! into a `MetricSnapshot` over the closed metric vocabulary:
//! - keys are canonicalised ("Eye Contact" -> "eye_contact") and looked up
//!   in the skill's profile; anything else is dropped with a warning
//! - values are converted from the metric's declared scale and clamped
//! - required metrics that are missing get the configured default and the
//!   snapshot is flagged `incomplete`

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;
use tracing::{debug, warn};

use crate::catalog::{Metric, SkillId, SkillProfile, METRIC_VOCABULARY_VERSION};
use crate::error::{EngineResult, ValidationError};

static KEY_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// A normalized value plus how many raw samples produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: f64,
    /// 0 for defaulted metrics
    pub samples: u32,
}

/// Immutable normalized measurements for one analysis chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    skill: SkillId,
    captured_at: DateTime<Utc>,
    vocabulary_version: u32,
    metrics: BTreeMap<Metric, MetricReading>,
    defaulted: BTreeSet<Metric>,
    incomplete: bool,
}

impl MetricSnapshot {
    /// Build a snapshot from already-normalized single-sample values
    #[cfg(test)]
    pub fn from_values(skill: SkillId, values: &[(Metric, f64)]) -> Self {
        Self {
            skill,
            captured_at: Utc::now(),
            vocabulary_version: METRIC_VOCABULARY_VERSION,
            metrics: values
                .iter()
                .map(|(m, v)| (*m, MetricReading { value: v.clamp(0.0, 1.0), samples: 1 }))
                .collect(),
            defaulted: BTreeSet::new(),
            incomplete: false,
        }
    }

    pub fn skill(&self) -> SkillId {
        self.skill
    }

    pub fn reading(&self, metric: Metric) -> Option<&MetricReading> {
        self.metrics.get(&metric)
    }

    /// Value of a metric only if it was actually measured
    pub fn measured(&self, metric: Metric) -> Option<f64> {
        if self.defaulted.contains(&metric) {
            return None;
        }
        self.metrics.get(&metric).map(|r| r.value)
    }

    /// Every measured metric with its value, defaulted ones skipped
    pub fn measured_metrics(&self) -> impl Iterator<Item = (Metric, f64)> + '_ {
        self.metrics
            .iter()
            .filter(|(m, _)| !self.defaulted.contains(m))
            .map(|(m, r)| (*m, r.value))
    }

    pub fn is_defaulted(&self, metric: Metric) -> bool {
        self.defaulted.contains(&metric)
    }

    /// True when at least one required metric was filled with the default
    pub fn incomplete(&self) -> bool {
        self.incomplete
    }
}

/// Validates and normalizes raw metric payloads
#[derive(Debug, Clone)]
pub struct MetricNormalizer {
    profiles: HashMap<SkillId, SkillProfile>,
    default_value: f64,
}

impl MetricNormalizer {
    pub fn new(profiles: &[SkillProfile], default_value: f64) -> Self {
        Self {
            profiles: profiles.iter().map(|p| (p.skill, p.clone())).collect(),
            default_value,
        }
    }

    pub fn normalize(&self, skill: &str, raw: &Value) -> EngineResult<MetricSnapshot> {
        self.normalize_at(skill, raw, Utc::now())
    }

    pub fn normalize_at(
        &self,
        skill: &str,
        raw: &Value,
        captured_at: DateTime<Utc>,
    ) -> EngineResult<MetricSnapshot> {
        let skill_id =
            SkillId::parse(skill).ok_or_else(|| ValidationError::UnknownSkill(skill.to_string()))?;
        let profile = self
            .profiles
            .get(&skill_id)
            .ok_or_else(|| ValidationError::UnknownSkill(skill.to_string()))?;
        let payload = raw
            .as_object()
            .ok_or_else(|| ValidationError::MalformedPayload(value_kind(raw).to_string()))?;

        // metric -> (sum of raw values weighted by samples, total samples)
        let mut accumulated: BTreeMap<Metric, (f64, u32)> = BTreeMap::new();

        for (key, value) in payload {
            let canonical = canonical_key(key);
            let Some(spec) = Metric::parse(&canonical).and_then(|m| profile.spec(m)) else {
                warn!("Dropping unknown metric '{}' for {}", key, skill_id);
                continue;
            };

            match read_raw(value) {
                Some((mean, samples)) => {
                    let entry = accumulated.entry(spec.metric).or_insert((0.0, 0));
                    entry.0 += mean * f64::from(samples);
                    entry.1 = entry.1.saturating_add(samples);
                }
                None => {
                    warn!(
                        "Ignoring uninterpretable value for {} ({}): {}",
                        spec.metric,
                        skill_id,
                        value
                    );
                }
            }
        }

        let mut metrics = BTreeMap::new();
        let mut defaulted = BTreeSet::new();

        for spec in &profile.metrics {
            match accumulated.get(&spec.metric) {
                Some(&(sum, samples)) if samples > 0 => {
                    let mean = sum / f64::from(samples);
                    metrics.insert(
                        spec.metric,
                        MetricReading { value: spec.scale.normalize(mean), samples },
                    );
                }
                _ => {
                    debug!("Defaulting missing metric {} for {}", spec.metric, skill_id);
                    metrics.insert(
                        spec.metric,
                        MetricReading { value: self.default_value, samples: 0 },
                    );
                    defaulted.insert(spec.metric);
                }
            }
        }

        let incomplete = !defaulted.is_empty();
        if incomplete {
            warn!(
                "Incomplete metrics for {}: {} of {} defaulted",
                skill_id,
                defaulted.len(),
                profile.metrics.len()
            );
        }

        Ok(MetricSnapshot {
            skill: skill_id,
            captured_at,
            vocabulary_version: METRIC_VOCABULARY_VERSION,
            metrics,
            defaulted,
            incomplete,
        })
    }
}

/// "Eye Contact %" -> "eye_contact"
fn canonical_key(key: &str) -> String {
    let lowered = key.to_lowercase();
    KEY_SEPARATORS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

fn finite_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Interpret a raw metric value as (mean, sample count)
fn read_raw(value: &Value) -> Option<(f64, u32)> {
    match value {
        Value::Number(_) | Value::String(_) => finite_number(value).map(|n| (n, 1)),
        Value::Array(items) => {
            if items.is_empty() {
                return None;
            }
            let values: Option<Vec<f64>> = items.iter().map(finite_number).collect();
            let values = values?;
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            Some((mean, u32::try_from(values.len()).unwrap_or(u32::MAX)))
        }
        Value::Object(obj) => {
            let mean = finite_number(obj.get("value")?)?;
            let samples = obj
                .get("samples")
                .and_then(|s| s.as_u64())
                .map(|s| u32::try_from(s).unwrap_or(u32::MAX))
                .unwrap_or(1)
                .max(1);
            Some((mean, samples))
        }
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::skills::builtin_profiles;
    use crate::error::EngineError;
    use serde_json::json;

    fn normalizer() -> MetricNormalizer {
        MetricNormalizer::new(&builtin_profiles(), 0.5)
    }

    #[test]
    fn test_unknown_skill_is_validation_error() {
        let err = normalizer().normalize("juggling", &json!({})).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::UnknownSkill(ref s)) if s == "juggling"
        ));
    }

    #[test]
    fn test_non_object_payload_is_validation_error() {
        let err = normalizer().normalize("boxing", &json!([0.5, 0.6])).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_unknown_keys_dropped_and_missing_defaulted() {
        let snapshot = normalizer()
            .normalize(
                "Boxing",
                &json!({
                    "footwork_precision": 0.9,
                    "Punch Technique": 0.7,
                    "knife_skills": 0.8,
                    "vibes": 1.0
                }),
            )
            .unwrap();

        assert_eq!(snapshot.skill(), SkillId::Boxing);
        assert_eq!(snapshot.measured(Metric::FootworkPrecision), Some(0.9));
        assert_eq!(snapshot.measured(Metric::PunchTechnique), Some(0.7));
        assert!(snapshot.reading(Metric::KnifeSkills).is_none());
        assert!(snapshot.incomplete());
        assert!(snapshot.is_defaulted(Metric::Balance));
        assert_eq!(snapshot.reading(Metric::Balance).unwrap().value, 0.5);
        assert_eq!(snapshot.reading(Metric::Balance).unwrap().samples, 0);
        assert_eq!(snapshot.measured(Metric::Balance), None);
    }

    #[test]
    fn test_complete_payload_not_flagged() {
        let snapshot = normalizer()
            .normalize(
                "coding",
                &json!({
                    "problem_decomposition": 0.8,
                    "code_clarity": 0.7,
                    "debugging_speed": 0.6,
                    "explanation_clarity": 0.5
                }),
            )
            .unwrap();
        assert!(!snapshot.incomplete());
        assert_eq!(snapshot.measured_metrics().count(), 4);
    }

    #[test]
    fn test_out_of_range_values_clamped() {
        let snapshot = normalizer()
            .normalize("coding", &json!({"code_clarity": 1.8, "debugging_speed": -0.2}))
            .unwrap();
        assert_eq!(snapshot.measured(Metric::CodeClarity), Some(1.0));
        assert_eq!(snapshot.measured(Metric::DebuggingSpeed), Some(0.0));
    }

    #[test]
    fn test_declared_scales_applied() {
        let snapshot = normalizer()
            .normalize(
                "public speaking",
                &json!({"eye_contact": 62.0, "speaking_pace": "150"}),
            )
            .unwrap();
        let eye = snapshot.measured(Metric::EyeContact).unwrap();
        assert!((eye - 0.62).abs() < 1e-9);
        assert_eq!(snapshot.measured(Metric::SpeakingPace), Some(1.0));
    }

    #[test]
    fn test_sample_arrays_and_objects() {
        let snapshot = normalizer()
            .normalize(
                "music",
                &json!({
                    "rhythm_accuracy": [0.6, 0.8, 0.7],
                    "dynamics": {"value": 0.4, "samples": 5},
                    "tempo_control": 0.9
                }),
            )
            .unwrap();

        let rhythm = snapshot.reading(Metric::RhythmAccuracy).unwrap();
        assert!((rhythm.value - 0.7).abs() < 1e-9);
        assert_eq!(rhythm.samples, 3);
        assert_eq!(snapshot.reading(Metric::Dynamics).unwrap().samples, 5);
        assert_eq!(snapshot.reading(Metric::TempoControl).unwrap().samples, 1);
    }

    #[test]
    fn test_huge_sample_counts_saturate() {
        let snapshot = normalizer()
            .normalize(
                "boxing",
                &json!({
                    "timing": {"value": 0.9, "samples": u32::MAX},
                    "Timing": {"value": 0.9, "samples": 1}
                }),
            )
            .unwrap();

        let timing = snapshot.reading(Metric::Timing).unwrap();
        assert_eq!(timing.samples, u32::MAX);
        assert!((timing.value - 0.9).abs() < 1e-6);
        assert!(!snapshot.is_defaulted(Metric::Timing));
    }

    #[test]
    fn test_uninterpretable_value_treated_as_missing() {
        let snapshot = normalizer()
            .normalize("coding", &json!({"code_clarity": "excellent", "debugging_speed": null}))
            .unwrap();
        assert!(snapshot.is_defaulted(Metric::CodeClarity));
        assert!(snapshot.is_defaulted(Metric::DebuggingSpeed));
        assert!(snapshot.incomplete());
    }

    #[test]
    fn test_canonical_key() {
        assert_eq!(canonical_key("Eye Contact %"), "eye_contact");
        assert_eq!(canonical_key("eye-contact"), "eye_contact");
        assert_eq!(canonical_key("  Speaking__Pace "), "speaking_pace");
    }
}
