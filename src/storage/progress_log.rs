//! SQLite-backed progress log
//!
//! Append-only: the schema carries triggers that abort any UPDATE or
//! DELETE on `progress_records`, and each append is a single INSERT.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use super::PROGRESS_SCHEMA;
use crate::catalog::{Category, SkillId};
use crate::error::EngineResult;
use crate::progress::{duplicate, ProgressLog, ProgressRecord};

pub struct SqliteProgressLog {
    conn: Mutex<Connection>,
}

impl SqliteProgressLog {
    /// Open or create the log at the given path
    pub fn open(db_path: &Path) -> EngineResult<Self> {
        let conn = Connection::open(db_path)?;
        conn.execute_batch(PROGRESS_SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    #[cfg(test)]
    fn open_in_memory() -> EngineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(PROGRESS_SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    pub fn count(&self) -> EngineResult<usize> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM progress_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Fixed-width UTC text so that string order equals time order
fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

impl ProgressLog for SqliteProgressLog {
    fn append(&self, record: &ProgressRecord) -> EngineResult<()> {
        let categories = serde_json::to_string(&record.suggestion_categories)?;
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let result = conn.execute(
            r#"
            INSERT INTO progress_records
                (user_id, skill, session_id, score, timestamp, duration_seconds, suggestion_categories)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.user_id,
                record.skill.as_str(),
                record.session_id,
                record.score,
                encode_timestamp(&record.timestamp),
                record.duration_seconds as i64,
                categories,
            ],
        );

        match result {
            Ok(_) => {
                debug!("Stored progress record {}/{}", record.user_id, record.session_id);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(duplicate(record).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn records(
        &self,
        user_id: &str,
        skill: SkillId,
        since: Option<DateTime<Utc>>,
    ) -> EngineResult<Vec<ProgressRecord>> {
        let since = since.map(|s| encode_timestamp(&s)).unwrap_or_default();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let mut stmt = conn.prepare(
            r#"
            SELECT session_id, score, timestamp, duration_seconds, suggestion_categories
            FROM progress_records
            WHERE user_id = ?1 AND skill = ?2 AND timestamp >= ?3
            ORDER BY timestamp ASC, id ASC
            "#,
        )?;
        let rows = stmt.query_map(params![user_id, skill.as_str(), since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                decode_timestamp(2, &row.get::<_, String>(2)?)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (session_id, score, timestamp, duration, categories) = row?;
            let suggestion_categories: Vec<Category> = serde_json::from_str(&categories)?;
            out.push(ProgressRecord {
                user_id: user_id.to_string(),
                skill,
                session_id,
                score,
                timestamp,
                duration_seconds: duration.max(0) as u64,
                suggestion_categories,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EngineError, ValidationError};
    use chrono::Duration;

    fn is_append_only_violation(err: &EngineError) -> bool {
        matches!(err, EngineError::Storage(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains("append-only"))
    }

    fn record(session: &str, score: f64, ts: DateTime<Utc>) -> ProgressRecord {
        ProgressRecord {
            user_id: "ana".into(),
            skill: SkillId::Cooking,
            session_id: session.into(),
            score,
            timestamp: ts,
            duration_seconds: 120,
            suggestion_categories: vec![Category::Technique, Category::Timing],
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = SqliteProgressLog::open(&dir.path().join("progress.sqlite")).unwrap();
        let now = Utc::now();

        log.append(&record("b", 70.0, now)).unwrap();
        log.append(&record("a", 65.0, now - Duration::hours(1))).unwrap();

        let records = log.records("ana", SkillId::Cooking, None).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].session_id, "a");
        assert_eq!(records[1].score, 70.0);
        assert_eq!(records[1].suggestion_categories, vec![Category::Technique, Category::Timing]);
        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn test_duplicate_tuple_rejected() {
        let log = SqliteProgressLog::open_in_memory().unwrap();
        let now = Utc::now();
        log.append(&record("s1", 70.0, now)).unwrap();

        let err = log.append(&record("s1", 10.0, now)).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::DuplicateProgress { .. })
        ));
        assert_eq!(log.count().unwrap(), 1);
    }

    #[test]
    fn test_rows_cannot_be_rewritten() {
        let log = SqliteProgressLog::open_in_memory().unwrap();
        log.append(&record("s1", 70.0, Utc::now())).unwrap();

        let conn = log.conn.lock().unwrap();
        let update = conn.execute("UPDATE progress_records SET score = 100", []);
        let err: EngineError = update.unwrap_err().into();
        assert!(is_append_only_violation(&err));

        let delete = conn.execute("DELETE FROM progress_records", []);
        assert!(delete.is_err());
        drop(conn);

        assert_eq!(log.records("ana", SkillId::Cooking, None).unwrap()[0].score, 70.0);
    }

    #[test]
    fn test_since_filter() {
        let log = SqliteProgressLog::open_in_memory().unwrap();
        let now = Utc::now();
        log.append(&record("old", 40.0, now - Duration::days(10))).unwrap();
        log.append(&record("new", 60.0, now - Duration::days(1))).unwrap();

        let recent = log
            .records("ana", SkillId::Cooking, Some(now - Duration::days(7)))
            .unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].session_id, "new");
        assert!(log.records("ben", SkillId::Cooking, None).unwrap().is_empty());
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.sqlite");
        SqliteProgressLog::open(&path)
            .unwrap()
            .append(&record("s1", 50.0, Utc::now()))
            .unwrap();

        let reopened = SqliteProgressLog::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
