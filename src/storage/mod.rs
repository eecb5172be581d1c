//! Storage module for SkillMirror
//!
//! Owns the data directory: the append-only progress log in SQLite, the
//! journey book and `config.toml`. Also provides status/statistics
//! reporting.

use anyhow::Result;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::info;

use crate::config::DEFAULT_CONFIG_TOML;
use crate::transfer::JourneyBook;

pub mod progress_log;

pub use progress_log::SqliteProgressLog;

pub const PROGRESS_DB: &str = "progress.sqlite";
pub const JOURNEYS_FILE: &str = "journeys.json";
pub const CONFIG_FILE: &str = "config.toml";

/// Schema for the progress log. Rows can be inserted, never changed
pub const PROGRESS_SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS progress_records (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        skill TEXT NOT NULL,
        session_id TEXT NOT NULL,
        score REAL NOT NULL,
        timestamp TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL DEFAULT 0,
        suggestion_categories TEXT NOT NULL DEFAULT '[]',
        UNIQUE(user_id, skill, session_id)
    );

    CREATE INDEX IF NOT EXISTS idx_progress_user_skill
        ON progress_records(user_id, skill, timestamp);

    CREATE TRIGGER IF NOT EXISTS progress_records_no_update
    BEFORE UPDATE ON progress_records
    BEGIN
        SELECT RAISE(ABORT, 'progress records are append-only');
    END;

    CREATE TRIGGER IF NOT EXISTS progress_records_no_delete
    BEFORE DELETE ON progress_records
    BEGIN
        SELECT RAISE(ABORT, 'progress records are append-only');
    END;
"#;

/// Initialize the data directory, progress database and configuration
pub async fn init() -> Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;

    let db_path = data_dir.join(PROGRESS_DB);
    let conn = Connection::open(&db_path)?;
    conn.execute_batch(PROGRESS_SCHEMA)?;

    info!("SkillMirror initialized at {:?}", data_dir);

    let config_path = data_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        std::fs::write(&config_path, DEFAULT_CONFIG_TOML)?;
        info!("Created default configuration at {:?}", config_path);
    }

    Ok(())
}

/// Show current SkillMirror status
pub async fn show_status() -> Result<()> {
    let data_dir = get_data_dir()?;

    println!("SkillMirror Status");
    println!("==================");
    println!();

    if !data_dir.exists() {
        println!("Status: NOT INITIALIZED");
        println!("Run 'skillmirror init' to initialize SkillMirror");
        return Ok(());
    }

    println!("Status: INITIALIZED");
    println!("Data directory: {:?}", data_dir);

    let db_path = data_dir.join(PROGRESS_DB);
    if db_path.exists() {
        let records = SqliteProgressLog::open(&db_path)?.count()?;
        println!("Progress records: {}", records);
    } else {
        println!("Database: NOT FOUND");
    }

    let journeys = JourneyBook::load(&data_dir.join(JOURNEYS_FILE))?;
    let open = journeys.journeys.iter().filter(|j| !j.completed).count();
    println!("Transfer journeys: {} ({} in progress)", journeys.journeys.len(), open);

    Ok(())
}

/// Show detailed SkillMirror statistics
pub async fn show_stats() -> Result<()> {
    let data_dir = get_data_dir()?;

    println!("SkillMirror Statistics");
    println!("======================");
    println!();

    if !data_dir.exists() {
        println!("SkillMirror not initialized. Run 'skillmirror init' first.");
        return Ok(());
    }

    let db_path = data_dir.join(PROGRESS_DB);
    if !db_path.exists() {
        println!("No database found.");
        return Ok(());
    }

    let conn = Connection::open(&db_path)?;

    println!("Practice Sessions:");
    println!("------------------");

    let (total, users): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), COUNT(DISTINCT user_id) FROM progress_records",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap_or((0, 0));
    println!("  Total sessions: {}", total);
    println!("  Users: {}", users);

    let mut stmt = conn.prepare(
        r#"
        SELECT skill, COUNT(*), AVG(score), MAX(score), SUM(duration_seconds)
        FROM progress_records
        GROUP BY skill
        ORDER BY COUNT(*) DESC, skill ASC
        "#,
    )?;
    let by_skill = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, f64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, i64>(4)?,
        ))
    })?;

    let mut has_sessions = false;
    println!("  By skill:");
    for (skill, count, avg, best, seconds) in by_skill.flatten() {
        has_sessions = true;
        println!(
            "    {}: {} sessions, avg {:.1}, best {:.1}, {:.1}h practiced",
            skill,
            count,
            avg,
            best,
            seconds as f64 / 3600.0
        );
    }
    if !has_sessions {
        println!("    No sessions recorded yet.");
    }

    println!();
    println!("Transfer Journeys:");
    println!("------------------");

    let book = JourneyBook::load(&data_dir.join(JOURNEYS_FILE))?;
    if book.journeys.is_empty() {
        println!("  No journeys started yet. Run 'skillmirror journey start' to begin one.");
    } else {
        let completed = book.journeys.iter().filter(|j| j.completed).count();
        let avg_progress = book.journeys.iter().map(|j| j.progress_percentage).sum::<f64>()
            / book.journeys.len() as f64;
        println!("  Total journeys: {}", book.journeys.len());
        println!("  Completed: {}", completed);
        println!("  Avg progress: {:.1}%", avg_progress);
    }

    Ok(())
}

/// Resolve the data directory
///
/// `SKILLMIRROR_DIR` wins, then `./.skillmirror` if it exists, then
/// `~/.skillmirror`.
pub fn get_data_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("SKILLMIRROR_DIR") {
        return Ok(PathBuf::from(dir));
    }

    // Check for .skillmirror directory in current project first
    let cwd = std::env::current_dir()?;
    let project_dir = cwd.join(".skillmirror");
    if project_dir.exists() {
        return Ok(project_dir);
    }

    // Fall back to home directory
    let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(".skillmirror"))
}
