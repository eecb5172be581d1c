//! Per-chunk analysis: normalize, score, compare

pub mod comparison;
pub mod normalizer;
pub mod recommendations;
pub mod scoring;

pub use comparison::{compare, expert_feedback, rank_matches, ComparisonResult};
pub use normalizer::{MetricNormalizer, MetricSnapshot};
pub use recommendations::recommend_experts;
pub use scoring::{ScoreResult, ScoringEngine};
