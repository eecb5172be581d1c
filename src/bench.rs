//! Performance benchmarking for SkillMirror
//!
//! Measures the in-process engines against their latency targets:
//! - Chunk analysis (normalize + score + compare): <1ms
//! - Transfer recommendation: <0.5ms
//! - Learning path generation: <1ms
//! - Progress summary over 1000 records: <5ms

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use crate::catalog::{Category, SkillId};
use crate::engine::Engines;
use crate::progress::{MemoryProgressLog, ProgressLog, ProgressRecord, ProgressTracker};
use crate::transfer::UserHistory;

const ANALYSIS_TARGET_MS: f64 = 1.0;
const RECOMMEND_TARGET_MS: f64 = 0.5;
const PATH_TARGET_MS: f64 = 1.0;
const SUMMARY_TARGET_MS: f64 = 5.0;
const SUMMARY_RECORDS: usize = 1000;

/// Run performance benchmarks
pub async fn run_benchmarks(engines: &Engines) -> Result<BenchmarkResults> {
    println!("SkillMirror Performance Benchmarks");
    println!("==================================");
    println!();

    let mut results = BenchmarkResults::default();

    println!("1. Chunk Analysis Latency");
    println!("   Target: <{}ms", ANALYSIS_TARGET_MS);
    let (avg, min, max) = stats_ms(&benchmark_analysis(engines, 200)?);
    results.analysis_avg_ms = avg;
    results.analysis_max_ms = max;
    report(avg, min, max, ANALYSIS_TARGET_MS);

    println!("2. Transfer Recommendation Latency");
    println!("   Target: <{}ms", RECOMMEND_TARGET_MS);
    let (avg, min, max) = stats_ms(&benchmark_recommend(engines, 200));
    results.recommend_avg_ms = avg;
    report(avg, min, max, RECOMMEND_TARGET_MS);

    println!("3. Learning Path Generation Latency");
    println!("   Target: <{}ms", PATH_TARGET_MS);
    let (avg, min, max) = stats_ms(&benchmark_path(engines, 200)?);
    results.path_avg_ms = avg;
    report(avg, min, max, PATH_TARGET_MS);

    println!("4. Progress Summary Latency ({} records)", SUMMARY_RECORDS);
    println!("   Target: <{}ms", SUMMARY_TARGET_MS);
    let (avg, min, max) = stats_ms(&benchmark_summary(20)?);
    results.summary_avg_ms = avg;
    report(avg, min, max, SUMMARY_TARGET_MS);

    println!("Summary");
    println!("-------");
    if results.all_pass() {
        println!("✅ All benchmarks PASSED");
    } else {
        println!("❌ Some benchmarks FAILED - optimization needed");
    }
    println!();

    Ok(results)
}

fn stats_ms(times: &[u128]) -> (f64, f64, f64) {
    if times.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let avg = times.iter().sum::<u128>() as f64 / times.len() as f64;
    let min = *times.iter().min().unwrap_or(&0);
    let max = *times.iter().max().unwrap_or(&0);
    (avg / 1000.0, min as f64 / 1000.0, max as f64 / 1000.0)
}

fn report(avg: f64, min: f64, max: f64, target: f64) {
    println!("   Avg: {:.3}ms  Min: {:.3}ms  Max: {:.3}ms", avg, min, max);
    if avg < target {
        println!("   ✅ PASS");
    } else {
        println!("   ❌ FAIL (exceeds {}ms target)", target);
    }
    println!();
}

/// A full public speaking chunk in the mixed shapes the normalizer accepts
fn analysis_payload() -> Value {
    json!({
        "Posture Stability": 0.82,
        "eye-contact": 64,
        "gesture_coordination": [0.6, 0.7, 0.65],
        "speaking_pace": "142",
        "voice_modulation": {"value": 0.55, "samples": 4},
        "pause_timing": 0.7,
        "emotional_resonance": 0.75
    })
}

fn benchmark_analysis(engines: &Engines, iterations: usize) -> Result<Vec<u128>> {
    let payload = analysis_payload();

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        let analysis = engines.analyze("public_speaking", &payload)?;
        times.push(start.elapsed().as_micros());
        std::hint::black_box(analysis);
    }
    Ok(times)
}

fn benchmark_recommend(engines: &Engines, iterations: usize) -> Vec<u128> {
    let sources: BTreeSet<SkillId> = [SkillId::Boxing, SkillId::Coding, SkillId::Music]
        .into_iter()
        .collect();
    let history = UserHistory::default();

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        let recs = engines.transfer.recommend(&sources, &history);
        times.push(start.elapsed().as_micros());
        std::hint::black_box(recs);
    }
    times
}

fn benchmark_path(engines: &Engines, iterations: usize) -> Result<Vec<u128>> {
    let rec = engines
        .transfer
        .recommendation(SkillId::Music, SkillId::Business, &UserHistory::default())?;

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        let phases = engines.paths.generate(&rec);
        times.push(start.elapsed().as_micros());
        std::hint::black_box(phases);
    }
    Ok(times)
}

fn benchmark_summary(iterations: usize) -> Result<Vec<u128>> {
    let log = Arc::new(MemoryProgressLog::new());
    let now = Utc::now();
    for i in 0..SUMMARY_RECORDS {
        log.append(&ProgressRecord {
            user_id: "bench".to_string(),
            skill: SkillId::Cooking,
            session_id: format!("bench-{}", i),
            score: 40.0 + (i % 50) as f64,
            timestamp: now - Duration::minutes((SUMMARY_RECORDS - i) as i64),
            duration_seconds: 600,
            suggestion_categories: vec![Category::Technique, Category::Timing],
        })?;
    }
    let tracker = ProgressTracker::new(log);

    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations {
        let start = Instant::now();
        let summary = tracker.summarize_at("bench", SkillId::Cooking, 30, now)?;
        times.push(start.elapsed().as_micros());
        std::hint::black_box(summary);
    }
    Ok(times)
}

/// Benchmark results
#[derive(Debug, Default)]
pub struct BenchmarkResults {
    pub analysis_avg_ms: f64,
    pub analysis_max_ms: f64,
    pub recommend_avg_ms: f64,
    pub path_avg_ms: f64,
    pub summary_avg_ms: f64,
}

impl BenchmarkResults {
    /// Check if all benchmarks meet their targets
    pub fn all_pass(&self) -> bool {
        self.analysis_avg_ms < ANALYSIS_TARGET_MS
            && self.recommend_avg_ms < RECOMMEND_TARGET_MS
            && self.path_avg_ms < PATH_TARGET_MS
            && self.summary_avg_ms < SUMMARY_TARGET_MS
    }

    /// Format results as a markdown table
    pub fn to_markdown(&self) -> String {
        format!(
            r#"| Metric | Value | Target |
|--------|-------|--------|
| Chunk analysis (avg) | {:.3}ms | <{}ms |
| Chunk analysis (max) | {:.3}ms | - |
| Recommendation (avg) | {:.3}ms | <{}ms |
| Path generation (avg) | {:.3}ms | <{}ms |
| Progress summary (avg) | {:.3}ms | <{}ms |"#,
            self.analysis_avg_ms,
            ANALYSIS_TARGET_MS,
            self.analysis_max_ms,
            self.recommend_avg_ms,
            RECOMMEND_TARGET_MS,
            self.path_avg_ms,
            PATH_TARGET_MS,
            self.summary_avg_ms,
            SUMMARY_TARGET_MS
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_payload_is_complete() {
        let engines = Engines::builtin().unwrap();
        let payload = analysis_payload();
        let snapshot = engines.normalizer.normalize("public_speaking", &payload).unwrap();

        assert!(!snapshot.incomplete());
        // every key maps to a known metric, so nothing is dropped with a warning
        let keys = payload.as_object().unwrap().len();
        assert_eq!(snapshot.measured_metrics().count(), keys);
    }
}
