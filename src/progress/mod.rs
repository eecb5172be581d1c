//! Longitudinal progress tracking
//!
//! Scores are appended to a `ProgressLog` once per practice session and
//! never changed afterwards. Summaries are recomputed from the log on
//! every request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::catalog::{Category, SkillId};
use crate::error::{EngineResult, ValidationError};

pub mod tracker;

pub use tracker::ProgressTracker;

/// One practice session's result. Immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub user_id: String,
    pub skill: SkillId,
    pub session_id: String,
    /// 0-100
    pub score: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub duration_seconds: u64,
    /// Categories of the suggestions raised during the session
    #[serde(default)]
    pub suggestion_categories: Vec<Category>,
}

/// Append-only store of progress records
///
/// Implementations must reject a second record for the same
/// (user, skill, session) with `ValidationError::DuplicateProgress`.
pub trait ProgressLog: Send + Sync {
    fn append(&self, record: &ProgressRecord) -> EngineResult<()>;

    /// Records for one user and skill at or after `since`, oldest first
    fn records(
        &self,
        user_id: &str,
        skill: SkillId,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<ProgressRecord>>;
}

pub(crate) fn duplicate(record: &ProgressRecord) -> ValidationError {
    ValidationError::DuplicateProgress {
        user_id: record.user_id.clone(),
        skill: record.skill.as_str().to_string(),
        session_id: record.session_id.clone(),
    }
}

/// In-process log for tests and runs without a data directory
#[derive(Debug, Default)]
pub struct MemoryProgressLog {
    records: Mutex<Vec<ProgressRecord>>,
}

impl MemoryProgressLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressLog for MemoryProgressLog {
    fn append(&self, record: &ProgressRecord) -> EngineResult<()> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let exists = records.iter().any(|r| {
            r.user_id == record.user_id && r.skill == record.skill && r.session_id == record.session_id
        });
        if exists {
            return Err(duplicate(record).into());
        }
        records.push(record.clone());
        Ok(())
    }

    fn records(
        &self,
        user_id: &str,
        skill: SkillId,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<ProgressRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<ProgressRecord> = records
            .iter()
            .filter(|r| r.user_id == user_id && r.skill == skill)
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .cloned()
            .collect();
        // stable: equal timestamps keep append order
        out.sort_by_key(|r| r.timestamp);
        Ok(out)
    }
}
