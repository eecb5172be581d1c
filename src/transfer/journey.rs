//! Transfer journeys
//!
//! A journey tracks one user working through a recommended transfer, one
//! step per mapping. Journeys live in `journeys.json` in the data
//! directory; completed ones feed the novelty factor of later
//! recommendations through `UserHistory`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::SkillId;
use crate::error::{EngineResult, ValidationError};

const JOURNEY_BOOK_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferJourney {
    pub id: String,
    pub user_id: String,
    pub source_skill: SkillId,
    pub target_skill: SkillId,
    pub total_steps: u32,
    pub completed_steps: BTreeSet<u32>,
    /// Highest completed step, 0 before the first
    pub current_step: u32,
    pub progress_percentage: f64,
    pub completed: bool,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    #[serde(default)]
    pub feedback: Vec<String>,
}

impl TransferJourney {
    pub fn start(user_id: &str, source: SkillId, target: SkillId, total_steps: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            source_skill: source,
            target_skill: target,
            total_steps,
            completed_steps: BTreeSet::new(),
            current_step: 0,
            progress_percentage: 0.0,
            completed: false,
            started_at: now,
            last_activity: now,
            feedback: Vec::new(),
        }
    }

    /// Mark a 1-based step done. Completing a step twice changes nothing
    pub fn complete_step(&mut self, step: u32, feedback: Option<String>) -> EngineResult<()> {
        if step == 0 || step > self.total_steps {
            return Err(ValidationError::StepOutOfRange {
                step,
                total: self.total_steps,
            }
            .into());
        }

        if !self.completed_steps.insert(step) {
            debug!("Journey {} step {} already complete", self.id, step);
        }
        self.current_step = self.completed_steps.iter().next_back().copied().unwrap_or(0);
        self.progress_percentage =
            (self.completed_steps.len() as f64 / f64::from(self.total_steps) * 100.0).min(100.0);
        self.completed = self.completed_steps.len() as u32 >= self.total_steps;
        self.last_activity = Utc::now();
        if let Some(text) = feedback.filter(|t| !t.trim().is_empty()) {
            self.feedback.push(text);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Started,
    Resumed,
}

/// Completed transfers per target skill for one user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHistory {
    completed_by_target: BTreeMap<SkillId, u32>,
}

impl UserHistory {
    pub fn completed_into(&self, target: SkillId) -> u32 {
        self.completed_by_target.get(&target).copied().unwrap_or(0)
    }

    pub fn record_completion(&mut self, target: SkillId) {
        *self.completed_by_target.entry(target).or_insert(0) += 1;
    }
}

/// Every journey known to this data directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyBook {
    pub version: u32,
    pub journeys: Vec<TransferJourney>,
}

impl Default for JourneyBook {
    fn default() -> Self {
        Self {
            version: JOURNEY_BOOK_VERSION,
            journeys: Vec::new(),
        }
    }
}

impl JourneyBook {
    pub fn load(path: &Path) -> EngineResult<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> EngineResult<()> {
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp, json)?;
        std::fs::rename(tmp, path)?;
        Ok(())
    }

    /// Start a journey, or resume the user's unfinished one for the same pair
    pub fn start(
        &mut self,
        user_id: &str,
        source: SkillId,
        target: SkillId,
        total_steps: u32,
    ) -> (StartStatus, TransferJourney) {
        if let Some(existing) = self.journeys.iter().find(|j| {
            j.user_id == user_id && j.source_skill == source && j.target_skill == target && !j.completed
        }) {
            info!("Resuming journey {} for {}", existing.id, user_id);
            return (StartStatus::Resumed, existing.clone());
        }

        let journey = TransferJourney::start(user_id, source, target, total_steps);
        info!(
            "Started journey {} for {}: {} -> {} ({} steps)",
            journey.id, user_id, source, target, total_steps
        );
        self.journeys.push(journey.clone());
        (StartStatus::Started, journey)
    }

    pub fn complete_step(
        &mut self,
        journey_id: &str,
        step: u32,
        feedback: Option<String>,
    ) -> EngineResult<TransferJourney> {
        let journey = self
            .journeys
            .iter_mut()
            .find(|j| j.id == journey_id)
            .ok_or_else(|| ValidationError::UnknownJourney(journey_id.to_string()))?;
        journey.complete_step(step, feedback)?;
        Ok(journey.clone())
    }

    pub fn for_user(&self, user_id: &str) -> Vec<&TransferJourney> {
        self.journeys.iter().filter(|j| j.user_id == user_id).collect()
    }

    pub fn history(&self, user_id: &str) -> UserHistory {
        let mut history = UserHistory::default();
        for journey in self.for_user(user_id) {
            if journey.completed {
                history.record_completion(journey.target_skill);
            }
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    #[test]
    fn test_step_progress() {
        let mut journey = TransferJourney::start("ana", SkillId::Boxing, SkillId::PublicSpeaking, 3);
        journey.complete_step(2, None).unwrap();

        assert_eq!(journey.current_step, 2);
        assert!((journey.progress_percentage - 100.0 / 3.0).abs() < 1e-9);
        assert!(!journey.completed);

        journey.complete_step(1, Some("felt natural".into())).unwrap();
        journey.complete_step(3, None).unwrap();
        assert!(journey.completed);
        assert_eq!(journey.current_step, 3);
        assert!((journey.progress_percentage - 100.0).abs() < 1e-9);
        assert_eq!(journey.feedback, vec!["felt natural".to_string()]);
    }

    #[test]
    fn test_complete_step_is_idempotent() {
        let mut journey = TransferJourney::start("ana", SkillId::Coding, SkillId::Cooking, 3);
        journey.complete_step(1, None).unwrap();
        let pct = journey.progress_percentage;
        journey.complete_step(1, None).unwrap();
        assert_eq!(journey.progress_percentage, pct);
        assert_eq!(journey.completed_steps.len(), 1);
    }

    #[test]
    fn test_step_out_of_range() {
        let mut journey = TransferJourney::start("ana", SkillId::Coding, SkillId::Cooking, 3);
        for step in [0, 4] {
            let err = journey.complete_step(step, None).unwrap_err();
            assert!(matches!(
                err,
                EngineError::Validation(ValidationError::StepOutOfRange { total: 3, .. })
            ));
        }
        assert!(journey.completed_steps.is_empty());
    }

    #[test]
    fn test_start_resumes_open_journey() {
        let mut book = JourneyBook::default();
        let (status, first) = book.start("ana", SkillId::Music, SkillId::Business, 3);
        assert_eq!(status, StartStatus::Started);

        let (status, again) = book.start("ana", SkillId::Music, SkillId::Business, 3);
        assert_eq!(status, StartStatus::Resumed);
        assert_eq!(first.id, again.id);

        let (status, _) = book.start("ben", SkillId::Music, SkillId::Business, 3);
        assert_eq!(status, StartStatus::Started);
        assert_eq!(book.journeys.len(), 2);
    }

    #[test]
    fn test_history_counts_completed_journeys() {
        let mut book = JourneyBook::default();
        let (_, journey) = book.start("ana", SkillId::Boxing, SkillId::PublicSpeaking, 1);
        assert_eq!(book.history("ana").completed_into(SkillId::PublicSpeaking), 0);

        book.complete_step(&journey.id, 1, None).unwrap();
        let history = book.history("ana");
        assert_eq!(history.completed_into(SkillId::PublicSpeaking), 1);
        assert_eq!(history.completed_into(SkillId::Cooking), 0);
        assert_eq!(book.history("ben").completed_into(SkillId::PublicSpeaking), 0);
    }

    #[test]
    fn test_unknown_journey() {
        let mut book = JourneyBook::default();
        assert!(book.complete_step("missing", 1, None).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journeys.json");

        assert!(JourneyBook::load(&path).unwrap().journeys.is_empty());

        let mut book = JourneyBook::default();
        let (_, journey) = book.start("ana", SkillId::Coding, SkillId::Cooking, 3);
        book.complete_step(&journey.id, 2, None).unwrap();
        book.save(&path).unwrap();

        let loaded = JourneyBook::load(&path).unwrap();
        assert_eq!(loaded.journeys, book.journeys);
        assert!(!path.with_extension("tmp").exists());
    }
}
