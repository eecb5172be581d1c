//! Progress summaries and trend classification
//!
//! The window is split into thirds by elapsed time between its first and
//! last record (by record count when they share a timestamp). The trend
//! compares the mean score of the last third against the first third:
//!   improving   last - first >= 5 points
//!   declining   last - first <= -5 points
//!   stable      otherwise
//! A strictly monotonic window is classified by its direction even when
//! the difference is smaller. Fewer than 3 records is insufficient data.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{ProgressLog, ProgressRecord};
use crate::catalog::{Category, SkillId};
use crate::error::EngineResult;

const MIN_TREND_RECORDS: usize = 3;
const TREND_THRESHOLD: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementAreaCount {
    pub category: Category,
    pub occurrences: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub user_id: String,
    pub skill: SkillId,
    /// 0 means all history
    pub window_days: u32,
    pub trend: Trend,
    pub best_score: Option<f64>,
    pub latest_score: Option<f64>,
    pub average_score: Option<f64>,
    pub session_count: usize,
    pub total_practice_seconds: u64,
    pub top_improvement_areas: Vec<ImprovementAreaCount>,
}

/// Classify a time-ordered series of (timestamp, score) points
pub fn classify_trend(points: &[(DateTime<Utc>, f64)]) -> Trend {
    if points.len() < MIN_TREND_RECORDS {
        return Trend::InsufficientData;
    }

    if points.windows(2).all(|w| w[1].1 > w[0].1) {
        return Trend::Improving;
    }
    if points.windows(2).all(|w| w[1].1 < w[0].1) {
        return Trend::Declining;
    }

    let (first, last) = third_means(points);
    let diff = last - first;

    if diff >= TREND_THRESHOLD {
        Trend::Improving
    } else if diff <= -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    }
}

/// Mean scores of the first and last thirds of a window of at least one point
fn third_means(points: &[(DateTime<Utc>, f64)]) -> (f64, f64) {
    let n = points.len();
    let (start, end) = (points[0].0, points[n - 1].0);
    let span = end - start;

    if span <= Duration::zero() {
        let scores: Vec<f64> = points.iter().map(|(_, score)| *score).collect();
        let k = (n / 3).max(1);
        return (mean(&scores[..k]), mean(&scores[n - k..]));
    }

    // Both thirds are non-empty: they hold the first and last point
    let first: Vec<f64> = points
        .iter()
        .filter(|(at, _)| (*at - start) * 3 < span)
        .map(|(_, score)| *score)
        .collect();
    let last: Vec<f64> = points
        .iter()
        .filter(|(at, _)| (end - *at) * 3 < span)
        .map(|(_, score)| *score)
        .collect();
    (mean(&first), mean(&last))
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Categories by frequency, ties alphabetical
fn rank_improvement_areas(records: &[ProgressRecord]) -> Vec<ImprovementAreaCount> {
    let mut counts: BTreeMap<Category, u32> = BTreeMap::new();
    for record in records {
        for category in &record.suggestion_categories {
            *counts.entry(*category).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<ImprovementAreaCount> = counts
        .into_iter()
        .map(|(category, occurrences)| ImprovementAreaCount { category, occurrences })
        .collect();
    ranked.sort_by(|a, b| {
        b.occurrences
            .cmp(&a.occurrences)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });
    ranked
}

pub fn summarize_records(
    user_id: &str,
    skill: SkillId,
    window_days: u32,
    records: &[ProgressRecord],
) -> ProgressSummary {
    let scores: Vec<f64> = records.iter().map(|r| r.score).collect();
    let points: Vec<(DateTime<Utc>, f64)> = records.iter().map(|r| (r.timestamp, r.score)).collect();

    ProgressSummary {
        user_id: user_id.to_string(),
        skill,
        window_days,
        trend: classify_trend(&points),
        best_score: scores.iter().copied().reduce(f64::max),
        latest_score: scores.last().copied(),
        average_score: (!scores.is_empty()).then(|| mean(&scores)),
        session_count: records.len(),
        total_practice_seconds: records.iter().map(|r| r.duration_seconds).sum(),
        top_improvement_areas: rank_improvement_areas(records),
    }
}

/// Appends session results and summarizes history over a log
#[derive(Clone)]
pub struct ProgressTracker {
    log: Arc<dyn ProgressLog>,
}

impl ProgressTracker {
    pub fn new(log: Arc<dyn ProgressLog>) -> Self {
        Self { log }
    }

    pub async fn append(&self, record: ProgressRecord) -> EngineResult<()> {
        let log = Arc::clone(&self.log);
        tokio::task::spawn_blocking(move || -> EngineResult<()> {
            log.append(&record)?;
            debug!(
                "Appended progress for {} / {} session {}: {:.1}",
                record.user_id, record.skill, record.session_id, record.score
            );
            Ok(())
        })
        .await?
    }

    pub async fn summarize(
        &self,
        user_id: &str,
        skill: SkillId,
        window_days: u32,
    ) -> EngineResult<ProgressSummary> {
        let tracker = self.clone();
        let user_id = user_id.to_string();
        let now = Utc::now();
        tokio::task::spawn_blocking(move || tracker.summarize_at(&user_id, skill, window_days, now))
            .await?
    }

    /// Summary of the `window_days` before `now`
    pub fn summarize_at(
        &self,
        user_id: &str,
        skill: SkillId,
        window_days: u32,
        now: DateTime<Utc>,
    ) -> EngineResult<ProgressSummary> {
        let since = (window_days > 0).then(|| now - Duration::days(i64::from(window_days)));
        let records: Vec<ProgressRecord> = self
            .log
            .records(user_id, skill, since)?
            .into_iter()
            .filter(|r| r.timestamp <= now)
            .collect();
        Ok(summarize_records(user_id, skill, window_days, &records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::MemoryProgressLog;

    fn tracker() -> ProgressTracker {
        ProgressTracker::new(Arc::new(MemoryProgressLog::new()))
    }

    fn record(session: usize, score: f64, at: DateTime<Utc>, categories: &[Category]) -> ProgressRecord {
        ProgressRecord {
            user_id: "ana".into(),
            skill: SkillId::PublicSpeaking,
            session_id: format!("s{}", session),
            score,
            timestamp: at,
            duration_seconds: 300,
            suggestion_categories: categories.to_vec(),
        }
    }

    async fn append_scores(tracker: &ProgressTracker, scores: &[f64], now: DateTime<Utc>) {
        let n = scores.len() as i64;
        for (i, score) in scores.iter().enumerate() {
            let at = now - Duration::hours(n - i as i64);
            tracker.append(record(i, *score, at, &[])).await.unwrap();
        }
    }

    /// Scores one hour apart
    fn hourly(scores: &[f64]) -> Vec<(DateTime<Utc>, f64)> {
        at_hours(&scores.iter().enumerate().map(|(i, s)| (i as i64, *s)).collect::<Vec<_>>())
    }

    fn at_hours(points: &[(i64, f64)]) -> Vec<(DateTime<Utc>, f64)> {
        let base = DateTime::parse_from_rfc3339("2024-03-01T09:00:00Z").unwrap().with_timezone(&Utc);
        points.iter().map(|(h, s)| (base + Duration::hours(*h), *s)).collect()
    }

    #[tokio::test]
    async fn test_two_records_are_insufficient() {
        let tracker = tracker();
        let now = Utc::now();
        append_scores(&tracker, &[60.0, 90.0], now).await;

        let summary = tracker.summarize_at("ana", SkillId::PublicSpeaking, 7, now).unwrap();
        assert_eq!(summary.trend, Trend::InsufficientData);
        assert_eq!(summary.session_count, 2);
        assert_eq!(summary.best_score, Some(90.0));
        assert_eq!(summary.latest_score, Some(90.0));
        assert_eq!(summary.average_score, Some(75.0));
    }

    #[tokio::test]
    async fn test_empty_history() {
        let summary = tracker()
            .summarize("ana", SkillId::PublicSpeaking, 30)
            .await
            .unwrap();
        assert_eq!(summary.trend, Trend::InsufficientData);
        assert_eq!(summary.best_score, None);
        assert_eq!(summary.average_score, None);
        assert!(summary.top_improvement_areas.is_empty());
    }

    #[test]
    fn test_strictly_increasing_is_improving() {
        assert_eq!(classify_trend(&hourly(&[50.0, 51.0, 52.0])), Trend::Improving);
        assert_eq!(classify_trend(&hourly(&[10.0, 20.0, 30.0, 40.0, 50.0])), Trend::Improving);
    }

    #[test]
    fn test_strictly_decreasing_is_declining() {
        assert_eq!(classify_trend(&hourly(&[52.0, 51.0, 50.0])), Trend::Declining);
        assert_eq!(classify_trend(&hourly(&[90.0, 70.0, 60.0, 30.0])), Trend::Declining);
    }

    #[test]
    fn test_thirds_comparison() {
        // first third 60, last third 66
        assert_eq!(classify_trend(&hourly(&[60.0, 70.0, 58.0, 66.0])), Trend::Improving);
        // first third 70, last third 64
        assert_eq!(classify_trend(&hourly(&[70.0, 60.0, 75.0, 64.0])), Trend::Declining);
        // within 5 points
        assert_eq!(classify_trend(&hourly(&[70.0, 60.0, 75.0, 72.0])), Trend::Stable);
        assert_eq!(classify_trend(&hourly(&[70.0, 70.0, 70.0])), Trend::Stable);
    }

    #[test]
    fn test_thirds_cut_by_elapsed_time() {
        // Two early sessions then two a day later: thirds are {60, 62} and {70, 63}
        let points = at_hours(&[(0, 60.0), (1, 62.0), (29, 70.0), (30, 63.0)]);
        assert_eq!(classify_trend(&points), Trend::Improving);

        // Thirds are {60} and {70, 58, 66}; by count this would be improving
        let points = at_hours(&[(0, 60.0), (28, 70.0), (29, 58.0), (30, 66.0)]);
        assert_eq!(classify_trend(&points), Trend::Stable);
    }

    #[test]
    fn test_shared_timestamp_splits_by_count() {
        let points = at_hours(&[(5, 60.0), (5, 70.0), (5, 58.0), (5, 66.0)]);
        assert_eq!(classify_trend(&points), Trend::Improving);
    }

    #[test]
    fn test_fewer_than_three_never_stable() {
        assert_eq!(classify_trend(&hourly(&[])), Trend::InsufficientData);
        assert_eq!(classify_trend(&hourly(&[70.0])), Trend::InsufficientData);
        assert_eq!(classify_trend(&hourly(&[70.0, 70.0])), Trend::InsufficientData);
    }

    #[tokio::test]
    async fn test_window_excludes_old_records() {
        let tracker = tracker();
        let now = Utc::now();
        tracker
            .append(record(10, 20.0, now - Duration::days(20), &[]))
            .await
            .unwrap();
        append_scores(&tracker, &[70.0, 71.0], now).await;

        let week = tracker.summarize_at("ana", SkillId::PublicSpeaking, 7, now).unwrap();
        assert_eq!(week.session_count, 2);
        assert_eq!(week.trend, Trend::InsufficientData);

        let month = tracker.summarize_at("ana", SkillId::PublicSpeaking, 30, now).unwrap();
        assert_eq!(month.session_count, 3);
        assert_eq!(month.trend, Trend::Improving);

        let all = tracker.summarize_at("ana", SkillId::PublicSpeaking, 0, now).unwrap();
        assert_eq!(all.session_count, 3);
    }

    #[tokio::test]
    async fn test_improvement_areas_ranked() {
        let tracker = tracker();
        let now = Utc::now();
        let sessions: [&[Category]; 3] = [
            &[Category::Timing, Category::Speech],
            &[Category::Timing, Category::Movement],
            &[Category::Speech, Category::Technique, Category::Timing],
        ];
        for (i, categories) in sessions.iter().enumerate() {
            let at = now - Duration::hours(3 - i as i64);
            tracker.append(record(i, 60.0, at, categories)).await.unwrap();
        }

        let summary = tracker.summarize_at("ana", SkillId::PublicSpeaking, 7, now).unwrap();
        let ranked: Vec<_> = summary
            .top_improvement_areas
            .iter()
            .map(|a| (a.category, a.occurrences))
            .collect();
        assert_eq!(
            ranked,
            vec![
                (Category::Timing, 3),
                (Category::Speech, 2),
                (Category::Movement, 1),
                (Category::Technique, 1),
            ]
        );
        assert_eq!(summary.total_practice_seconds, 900);
    }

    #[tokio::test]
    async fn test_duplicate_append_surfaces_error() {
        let tracker = tracker();
        let now = Utc::now();
        tracker.append(record(1, 50.0, now, &[])).await.unwrap();
        assert!(tracker.append(record(1, 55.0, now, &[])).await.is_err());
    }
}
