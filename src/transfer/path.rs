//! Learning path generation
//!
//! A path has one phase per difficulty tier, easiest first. Exercises are
//! drawn from each mapping's examples with an RNG seeded from the configured
//! seed and the mapping itself, so the same recommendation always produces
//! the same path.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::compatibility::TransferRecommendation;
use crate::catalog::SkillMapping;

const MAX_DRILLS_PER_MAPPING: usize = 3;
const MAX_DIFFICULTY: u8 = 5;
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;
const DRILL_MINUTES: [u32; 4] = [10, 15, 20, 25];
const INTEGRATION_MINUTES: u32 = 30;
const MILESTONES: [u8; 4] = [25, 50, 75, 100];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    /// Practice one example technique
    Drill,
    /// Combine the mapping's components end to end
    Integration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub title: String,
    pub description: String,
    pub kind: ExerciseKind,
    pub duration_minutes: u32,
    pub difficulty: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningPhase {
    /// Starts at 1
    pub phase_number: u32,
    pub difficulty: u8,
    pub mappings_covered: Vec<SkillMapping>,
    pub phase_hours: f64,
    pub cumulative_hours: f64,
    pub exercises: Vec<Exercise>,
    pub success_criteria: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub percent: u8,
    /// First phase whose cumulative hours reach the percentage
    pub phase_number: u32,
    pub cumulative_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub total_phases: usize,
    pub total_hours: f64,
    pub estimated_weeks: u32,
    pub milestones: Vec<Milestone>,
}

#[derive(Debug, Clone)]
pub struct PathGenerator {
    seed: u64,
}

impl PathGenerator {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    pub fn generate(&self, recommendation: &TransferRecommendation) -> Vec<LearningPhase> {
        let mut tiers: BTreeMap<u8, Vec<&SkillMapping>> = BTreeMap::new();
        for mapping in &recommendation.mappings {
            tiers.entry(mapping.difficulty).or_default().push(mapping);
        }

        let mut phases = Vec::with_capacity(tiers.len());
        let mut cumulative_hours = 0.0;

        for (index, (difficulty, mappings)) in tiers.into_iter().enumerate() {
            let phase_hours: f64 = mappings.iter().map(|m| m.estimated_hours).sum();
            cumulative_hours += phase_hours;

            let exercises = mappings.iter().flat_map(|m| self.exercises(m)).collect();
            let success_criteria = mappings.iter().flat_map(|m| success_criteria(m)).collect();

            phases.push(LearningPhase {
                phase_number: index as u32 + 1,
                difficulty,
                mappings_covered: mappings.into_iter().cloned().collect(),
                phase_hours,
                cumulative_hours,
                exercises,
                success_criteria,
            });
        }

        phases
    }

    fn exercises(&self, mapping: &SkillMapping) -> Vec<Exercise> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed ^ mapping_fingerprint(mapping));

        let mut examples: Vec<&String> = mapping.examples.iter().collect();
        examples.shuffle(&mut rng);

        let mut out: Vec<Exercise> = examples
            .into_iter()
            .take(MAX_DRILLS_PER_MAPPING)
            .map(|example| Exercise {
                title: format!("{} drill", mapping.target_component),
                description: example.clone(),
                kind: ExerciseKind::Drill,
                duration_minutes: DRILL_MINUTES[rng.gen_range(0..DRILL_MINUTES.len())],
                difficulty: mapping.difficulty,
            })
            .collect();

        out.push(Exercise {
            title: format!("{} integration", mapping.target_component),
            description: format!(
                "Apply {} principles to {} in a full practice run",
                mapping.source_component, mapping.target_component
            ),
            kind: ExerciseKind::Integration,
            duration_minutes: INTEGRATION_MINUTES,
            difficulty: (mapping.difficulty + 1).min(MAX_DIFFICULTY),
        });

        out
    }
}

/// Stable identity of a mapping for seeding
///
/// FNV-1a over the component names and difficulty. Fixed across platforms
/// and releases, unlike std's `DefaultHasher`.
fn mapping_fingerprint(mapping: &SkillMapping) -> u64 {
    let bytes = mapping
        .source_component
        .bytes()
        .chain([0xff])
        .chain(mapping.target_component.bytes())
        .chain([0xff, mapping.difficulty]);
    bytes.fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn success_criteria(mapping: &SkillMapping) -> Vec<String> {
    let (source, target) = (&mapping.source_component, &mapping.target_component);
    let mut criteria = vec![
        format!("Explain how {} applies to {}", source, target),
        format!("Execute {} using {} principles", target, source),
        format!("Show consistent improvement in {}", target),
    ];
    if !mapping.examples.is_empty() {
        let picked: Vec<&str> = mapping.examples.iter().take(2).map(String::as_str).collect();
        criteria.push(format!("Apply at least 2 example techniques: {}", picked.join("; ")));
    }
    criteria
}

/// Totals and milestone phases for a generated path
pub fn path_summary(phases: &[LearningPhase], hours_per_week: f64) -> PathSummary {
    let total_hours = phases.last().map(|p| p.cumulative_hours).unwrap_or(0.0);
    let estimated_weeks = if hours_per_week > 0.0 {
        (total_hours / hours_per_week).ceil() as u32
    } else {
        0
    };

    let milestones = MILESTONES
        .iter()
        .filter_map(|percent| {
            let needed = total_hours * f64::from(*percent) / 100.0;
            phases
                .iter()
                .find(|p| p.cumulative_hours + 1e-9 >= needed)
                .map(|p| Milestone {
                    percent: *percent,
                    phase_number: p.phase_number,
                    cumulative_hours: p.cumulative_hours,
                })
        })
        .collect();

    PathSummary {
        total_phases: phases.len(),
        total_hours,
        estimated_weeks,
        milestones,
    }
}
