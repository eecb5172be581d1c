//! Cross-domain transfer mappings
//!
//! A `TransferGroup` holds every component mapping declared between one
//! source skill and one target skill. Example:
//!   Boxing -> Public Speaking
//!     Footwork          -> Stage Presence       (0.85, difficulty 2)
//!     Timing and Rhythm -> Speech Rhythm        (0.90, difficulty 3)
//!     Mental Focus      -> Audience Engagement  (0.80, difficulty 4)

use serde::{Deserialize, Serialize};

use super::skills::SkillId;

/// One transferable sub-skill pairing between two skill domains
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMapping {
    pub source_component: String,
    pub target_component: String,
    /// How well the component transfers (0-1)
    pub strength: f64,
    /// 1 (easy) to 5 (hard)
    pub difficulty: u8,
    pub estimated_hours: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl SkillMapping {
    /// Aggregation weight: easier mappings count for more
    pub fn difficulty_weight(&self) -> f64 {
        1.0 / f64::from(self.difficulty.max(1))
    }
}

/// All mappings declared from one skill to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferGroup {
    pub source: SkillId,
    pub target: SkillId,
    pub mappings: Vec<SkillMapping>,
}

/// Coarse trait profile of a skill, used when no mapping group exists
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkillCharacteristics {
    pub physical: f64,
    pub mental: f64,
    pub timing: f64,
    pub coordination: f64,
}

pub fn builtin_characteristics(skill: SkillId) -> Option<SkillCharacteristics> {
    let (physical, mental, timing, coordination) = match skill {
        SkillId::Boxing => (0.9, 0.8, 0.9, 0.9),
        SkillId::PublicSpeaking => (0.3, 0.9, 0.8, 0.4),
        SkillId::Coding => (0.1, 0.9, 0.6, 0.3),
        SkillId::Cooking => (0.6, 0.7, 0.8, 0.8),
        SkillId::Music => (0.7, 0.8, 0.9, 0.9),
        SkillId::Business => (0.2, 0.9, 0.7, 0.6),
        SkillId::Dance => return None,
    };
    Some(SkillCharacteristics { physical, mental, timing, coordination })
}

fn mapping(
    source_component: &str,
    target_component: &str,
    strength: f64,
    difficulty: u8,
    estimated_hours: f64,
    description: &str,
    examples: &[&str],
) -> SkillMapping {
    SkillMapping {
        source_component: source_component.to_string(),
        target_component: target_component.to_string(),
        strength,
        difficulty,
        estimated_hours,
        description: description.to_string(),
        examples: examples.iter().map(|e| e.to_string()).collect(),
    }
}

/// Built-in transfer catalog
pub fn builtin_groups() -> Vec<TransferGroup> {
    vec![
        TransferGroup {
            source: SkillId::Boxing,
            target: SkillId::PublicSpeaking,
            mappings: vec![
                mapping(
                    "Footwork",
                    "Stage Presence",
                    0.85,
                    2,
                    15.0,
                    "Boxing footwork translates to confident stage movement and positioning",
                    &[
                        "Maintain balanced stance -> Stand confidently with weight distributed",
                        "Quick lateral movement -> Move purposefully across stage",
                        "Pivot on balls of feet -> Turn to address different audience sections",
                    ],
                ),
                mapping(
                    "Timing and Rhythm",
                    "Speech Rhythm",
                    0.9,
                    3,
                    20.0,
                    "Boxing timing sense transfers to speech pacing and dramatic pauses",
                    &[
                        "Reading opponent's rhythm -> Reading audience energy",
                        "Timing combination punches -> Timing key message delivery",
                        "Creating rhythm disruption -> Using strategic pauses for impact",
                    ],
                ),
                mapping(
                    "Mental Focus",
                    "Audience Engagement",
                    0.8,
                    4,
                    25.0,
                    "Boxing mental discipline enhances sustained audience connection",
                    &[
                        "Maintaining focus under pressure -> Staying composed during tough questions",
                        "Reading opponent reactions -> Reading audience body language",
                        "Strategic thinking mid-fight -> Adapting message based on audience response",
                    ],
                ),
            ],
        },
        TransferGroup {
            source: SkillId::Coding,
            target: SkillId::Cooking,
            mappings: vec![
                mapping(
                    "Logical Structure",
                    "Recipe Organization",
                    0.9,
                    2,
                    12.0,
                    "Code organization principles apply to recipe development and meal planning",
                    &[
                        "Function modularity -> Breaking recipes into components",
                        "Code dependencies -> Understanding ingredient interactions",
                        "Error handling -> Troubleshooting cooking problems",
                    ],
                ),
                mapping(
                    "Debugging Skills",
                    "Taste Testing",
                    0.85,
                    3,
                    18.0,
                    "Systematic debugging translates to iterative taste refinement",
                    &[
                        "Isolating bugs -> Identifying specific flavor issues",
                        "Testing edge cases -> Trying recipe variations",
                        "Performance optimization -> Balancing flavors and textures",
                    ],
                ),
                mapping(
                    "Version Control",
                    "Recipe Iteration",
                    0.75,
                    2,
                    10.0,
                    "Code versioning principles improve recipe development tracking",
                    &[
                        "Commit messages -> Documenting recipe changes",
                        "Branching -> Trying alternative ingredient combinations",
                        "Merging -> Combining successful recipe elements",
                    ],
                ),
            ],
        },
        TransferGroup {
            source: SkillId::Music,
            target: SkillId::Business,
            mappings: vec![
                mapping(
                    "Rhythm and Timing",
                    "Market Timing",
                    0.8,
                    4,
                    30.0,
                    "Musical timing sense enhances business opportunity recognition",
                    &[
                        "Feeling the beat -> Sensing market rhythms",
                        "Tempo changes -> Adapting to market pace",
                        "Syncopation -> Finding unique market entry points",
                    ],
                ),
                mapping(
                    "Harmony and Arrangement",
                    "Team Collaboration",
                    0.85,
                    3,
                    25.0,
                    "Musical harmony principles improve team dynamics and leadership",
                    &[
                        "Balancing instruments -> Balancing team roles",
                        "Creating musical tension -> Managing productive conflict",
                        "Ensemble coordination -> Team synchronization",
                    ],
                ),
                mapping(
                    "Improvisation",
                    "Strategic Adaptation",
                    0.9,
                    5,
                    35.0,
                    "Musical improvisation skills enhance business agility and problem-solving",
                    &[
                        "Real-time adaptation -> Responding to market changes",
                        "Building on themes -> Developing core business strategies",
                        "Reading the room -> Adapting pitch to audience",
                    ],
                ),
            ],
        },
    ]
}
