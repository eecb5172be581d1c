//! Per-session analysis lanes
//!
//! Every open session gets one spawned task fed by a bounded channel, so
//! chunks of the same session are analyzed strictly in arrival order while
//! different sessions run in parallel. Ending a session closes the lane to
//! new chunks, lets queued chunks finish, then appends one progress record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use crate::analysis::{rank_matches, ComparisonResult, ScoreResult};
use crate::catalog::{Category, Metric, SkillId};
use crate::engine::Engines;
use crate::error::{EngineResult, ValidationError};
use crate::progress::{ProgressRecord, ProgressTracker};

/// Queued chunks per session before `submit` waits
const LANE_CAPACITY: usize = 32;
/// Expert matches reported per chunk
const TOP_MATCHES: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkReport {
    pub session_id: String,
    /// 1-based position of the chunk within the session
    pub chunk_index: u32,
    pub score: ScoreResult,
    pub top_matches: Vec<ComparisonResult>,
    /// Mean overall score of all chunks so far
    pub running_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub user_id: String,
    pub skill: SkillId,
    pub chunks_processed: u32,
    pub final_score: Option<f64>,
    pub duration_seconds: u64,
    /// Appended record, absent when no chunk was processed
    pub record: Option<ProgressRecord>,
}

enum LaneCommand {
    Chunk {
        raw: Value,
        reply: oneshot::Sender<EngineResult<ChunkReport>>,
    },
    End {
        reply: oneshot::Sender<EngineResult<SessionOutcome>>,
    },
}

struct Lane {
    session_id: String,
    user_id: String,
    skill: SkillId,
    started_at: DateTime<Utc>,
    chunks: u32,
    score_sum: f64,
    /// Latest category per metric that drew a suggestion
    suggested: BTreeMap<Metric, Category>,
}

impl Lane {
    fn analyze(&mut self, engines: &Engines, raw: &Value) -> EngineResult<ChunkReport> {
        let analysis = engines.analyze(self.skill.as_str(), raw)?;

        self.chunks += 1;
        self.score_sum += analysis.score.overall_score;
        for suggestion in &analysis.score.suggestions {
            self.suggested.insert(suggestion.metric, suggestion.category);
        }

        Ok(ChunkReport {
            session_id: self.session_id.clone(),
            chunk_index: self.chunks,
            running_score: self.score_sum / f64::from(self.chunks),
            top_matches: rank_matches(analysis.comparisons, TOP_MATCHES),
            score: analysis.score,
        })
    }

    async fn finish(self, tracker: &ProgressTracker) -> EngineResult<SessionOutcome> {
        let ended_at = Utc::now();
        let duration_seconds = (ended_at - self.started_at).num_seconds().max(0) as u64;
        let final_score = (self.chunks > 0).then(|| self.score_sum / f64::from(self.chunks));

        let record = match final_score {
            Some(score) => {
                let record = ProgressRecord {
                    user_id: self.user_id.clone(),
                    skill: self.skill,
                    session_id: self.session_id.clone(),
                    score,
                    timestamp: ended_at,
                    duration_seconds,
                    suggestion_categories: self.suggested.values().copied().collect(),
                };
                tracker.append(record.clone()).await?;
                Some(record)
            }
            None => {
                debug!("Session {} ended without chunks; nothing recorded", self.session_id);
                None
            }
        };

        Ok(SessionOutcome {
            session_id: self.session_id,
            user_id: self.user_id,
            skill: self.skill,
            chunks_processed: self.chunks,
            final_score,
            duration_seconds,
            record,
        })
    }
}

async fn run_lane(
    mut lane: Lane,
    engines: Arc<Engines>,
    tracker: ProgressTracker,
    mut commands: mpsc::Receiver<LaneCommand>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            LaneCommand::Chunk { raw, reply } => {
                let report = lane.analyze(&engines, &raw);
                if let Err(e) = &report {
                    warn!("Chunk rejected in session {}: {}", lane.session_id, e);
                }
                // caller may have gone away; the chunk still counts
                let _ = reply.send(report);
            }
            LaneCommand::End { reply } => {
                let session_id = lane.session_id.clone();
                let outcome = lane.finish(&tracker).await;
                info!("Session {} closed", session_id);
                let _ = reply.send(outcome);
                return;
            }
        }
    }
}

/// Routes chunks to their session's lane
pub struct SessionManager {
    engines: Arc<Engines>,
    tracker: ProgressTracker,
    lanes: Mutex<HashMap<String, mpsc::Sender<LaneCommand>>>,
}

impl SessionManager {
    pub fn new(engines: Arc<Engines>, tracker: ProgressTracker) -> Self {
        Self {
            engines,
            tracker,
            lanes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn open(&self, session_id: &str, user_id: &str, skill: &str) -> EngineResult<()> {
        let skill = SkillId::parse(skill).ok_or_else(|| ValidationError::UnknownSkill(skill.to_string()))?;

        let mut lanes = self.lanes.lock().await;
        if lanes.contains_key(session_id) {
            return Err(ValidationError::SessionAlreadyOpen(session_id.to_string()).into());
        }

        let (tx, rx) = mpsc::channel(LANE_CAPACITY);
        let lane = Lane {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            skill,
            started_at: Utc::now(),
            chunks: 0,
            score_sum: 0.0,
            suggested: BTreeMap::new(),
        };
        tokio::spawn(run_lane(lane, Arc::clone(&self.engines), self.tracker.clone(), rx));
        lanes.insert(session_id.to_string(), tx);

        info!("Session {} opened for {} ({})", session_id, user_id, skill);
        Ok(())
    }

    /// Analyze one chunk after every chunk submitted before it
    pub async fn submit(&self, session_id: &str, raw: Value) -> EngineResult<ChunkReport> {
        let sender = {
            let lanes = self.lanes.lock().await;
            lanes.get(session_id).cloned()
        }
        .ok_or_else(|| ValidationError::UnknownSession(session_id.to_string()))?;

        let (reply, rx) = oneshot::channel();
        sender
            .send(LaneCommand::Chunk { raw, reply })
            .await
            .map_err(|_| ValidationError::UnknownSession(session_id.to_string()))?;
        rx.await
            .map_err(|_| ValidationError::UnknownSession(session_id.to_string()))?
    }

    /// Stop accepting chunks, drain the queue and record the session
    pub async fn end(&self, session_id: &str) -> EngineResult<SessionOutcome> {
        let sender = self
            .lanes
            .lock()
            .await
            .remove(session_id)
            .ok_or_else(|| ValidationError::UnknownSession(session_id.to_string()))?;

        let (reply, rx) = oneshot::channel();
        sender
            .send(LaneCommand::End { reply })
            .await
            .map_err(|_| ValidationError::UnknownSession(session_id.to_string()))?;
        rx.await
            .map_err(|_| ValidationError::UnknownSession(session_id.to_string()))?
    }

    #[cfg(test)]
    async fn open_sessions(&self) -> usize {
        self.lanes.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::progress::MemoryProgressLog;
    use serde_json::json;

    fn manager() -> (SessionManager, ProgressTracker) {
        let engines = Arc::new(Engines::builtin().unwrap());
        let tracker = ProgressTracker::new(Arc::new(MemoryProgressLog::new()));
        (SessionManager::new(engines, tracker.clone()), tracker)
    }

    fn chunk(timing: f64) -> Value {
        json!({
            "footwork_precision": 0.8,
            "balance": 0.8,
            "punch_technique": 0.7,
            "defensive_movement": 0.6,
            "timing": timing,
            "coordination": 0.8
        })
    }

    #[tokio::test]
    async fn test_chunks_processed_in_order() {
        let (manager, _) = manager();
        manager.open("s1", "ana", "boxing").await.unwrap();

        let mut scores = Vec::new();
        for (i, timing) in [0.2, 0.5, 0.9].iter().enumerate() {
            let report = manager.submit("s1", chunk(*timing)).await.unwrap();
            assert_eq!(report.chunk_index, i as u32 + 1);
            scores.push(report.score.overall_score);
            let mean = scores.iter().sum::<f64>() / scores.len() as f64;
            assert!((report.running_score - mean).abs() < 1e-9);
            assert_eq!(report.top_matches[0].expert_id, "ali");
        }
    }

    #[tokio::test]
    async fn test_end_appends_one_record() {
        let (manager, tracker) = manager();
        manager.open("s1", "ana", "boxing").await.unwrap();
        manager.submit("s1", chunk(0.3)).await.unwrap();
        manager.submit("s1", chunk(0.4)).await.unwrap();

        let outcome = manager.end("s1").await.unwrap();
        assert_eq!(outcome.chunks_processed, 2);
        let record = outcome.record.unwrap();
        assert_eq!(record.session_id, "s1");
        assert!(record.suggestion_categories.contains(&Category::Timing));

        let summary = tracker
            .summarize("ana", SkillId::Boxing, 30)
            .await
            .unwrap();
        assert_eq!(summary.session_count, 1);
        assert_eq!(summary.latest_score, outcome.final_score);
        assert_eq!(manager.open_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_queued_chunk_drains_before_end() {
        let (manager, _) = manager();
        manager.open("s1", "ana", "boxing").await.unwrap();

        let (report, outcome) = tokio::join!(manager.submit("s1", chunk(0.5)), manager.end("s1"));
        assert_eq!(report.unwrap().chunk_index, 1);
        assert_eq!(outcome.unwrap().chunks_processed, 1);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_chunks() {
        let (manager, _) = manager();
        manager.open("s1", "ana", "boxing").await.unwrap();
        manager.end("s1").await.unwrap();

        let err = manager.submit("s1", chunk(0.5)).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::UnknownSession(_))));
        assert!(manager.end("s1").await.is_err());
    }

    #[tokio::test]
    async fn test_empty_session_records_nothing() {
        let (manager, tracker) = manager();
        manager.open("s1", "ana", "dance").await.unwrap();
        let outcome = manager.end("s1").await.unwrap();

        assert_eq!(outcome.chunks_processed, 0);
        assert!(outcome.final_score.is_none());
        assert!(outcome.record.is_none());
        let summary = tracker.summarize("ana", SkillId::Dance, 30).await.unwrap();
        assert_eq!(summary.session_count, 0);
    }

    #[tokio::test]
    async fn test_bad_chunk_keeps_lane_open() {
        let (manager, _) = manager();
        manager.open("s1", "ana", "boxing").await.unwrap();

        assert!(manager.submit("s1", json!([1, 2, 3])).await.is_err());
        let report = manager.submit("s1", chunk(0.5)).await.unwrap();
        assert_eq!(report.chunk_index, 1);
    }

    #[tokio::test]
    async fn test_open_validation() {
        let (manager, _) = manager();
        assert!(manager.open("s1", "ana", "juggling").await.is_err());

        manager.open("s1", "ana", "music").await.unwrap();
        let err = manager.open("s1", "ben", "music").await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::SessionAlreadyOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_sessions_run_independently() {
        let manager = Arc::new(manager().0);
        for id in ["a", "b", "c"] {
            manager.open(id, "ana", "boxing").await.unwrap();
        }

        let mut handles = Vec::new();
        for id in ["a", "b", "c"] {
            let manager = Arc::clone(&manager);
            handles.push(tokio::spawn(async move {
                for _ in 0..5 {
                    manager.submit(id, chunk(0.5)).await.unwrap();
                }
                manager.end(id).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().chunks_processed, 5);
        }
    }
}
