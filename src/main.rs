use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod analysis;
mod bench;
mod catalog;
mod config;
mod engine;
mod error;
mod progress;
mod session;
mod storage;
mod transfer;

use analysis::{expert_feedback, rank_matches, recommend_experts};
use catalog::{Catalog, Category, Metric, SkillId};
use config::EngineConfig;
use engine::Engines;
use progress::{ProgressRecord, ProgressTracker};
use session::SessionManager;
use storage::SqliteProgressLog;
use transfer::{path_summary, JourneyBook, UserHistory};

/// SkillMirror - performance scoring, expert comparison and skill transfer
#[derive(Parser)]
#[command(name = "skillmirror")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scores practice sessions, compares them with experts and recommends skill transfers", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use a catalog JSON file instead of the built-in catalog
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the data directory and configuration
    Init,

    /// Show current status
    Status,

    /// Show detailed statistics
    Stats,

    /// Score one metric payload and compare it with the expert library
    Analyze {
        #[arg(long)]
        skill: String,
        /// JSON metric map ("-" reads stdin)
        #[arg(long)]
        input: PathBuf,
        /// Metrics whose suggestions were already acted on (comma separated)
        #[arg(long, value_delimiter = ',')]
        implemented: Vec<String>,
    },

    /// Rank expert matches for one metric payload
    Compare {
        #[arg(long)]
        skill: String,
        /// JSON metric map ("-" reads stdin)
        #[arg(long)]
        input: PathBuf,
        /// Number of matches to show
        #[arg(long, default_value = "3")]
        top: usize,
    },

    /// Recommend transfers out of the skills you already have
    Recommend {
        /// Source skills, comma separated
        #[arg(long, value_delimiter = ',', required = true)]
        from: Vec<String>,
        /// Discount targets this user has already completed journeys into
        #[arg(long)]
        user: Option<String>,
    },

    /// Generate the learning path for one transfer
    Path {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Compatibility of two skills
    Compat {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Record and summarize practice progress
    Progress {
        #[command(subcommand)]
        action: ProgressAction,
    },

    /// Run a whole practice session from a file of metric chunks
    Session {
        #[arg(long)]
        skill: String,
        #[arg(long)]
        user: String,
        /// Session id (generated if omitted)
        #[arg(long)]
        session: Option<String>,
        /// JSON array of metric maps, one per chunk ("-" reads stdin)
        #[arg(long)]
        input: PathBuf,
    },

    /// Track progress through a recommended transfer
    Journey {
        #[command(subcommand)]
        action: JourneyAction,
    },

    /// Inspect the reference catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Run performance benchmarks
    Bench {
        /// Also print results as a markdown table
        #[arg(long)]
        markdown: bool,
    },
}

#[derive(Subcommand)]
enum ProgressAction {
    /// Append one session result
    Append {
        #[arg(long)]
        user: String,
        #[arg(long)]
        skill: String,
        #[arg(long)]
        session: String,
        /// Overall score (0-100)
        #[arg(long)]
        score: f64,
        #[arg(long, default_value = "0")]
        duration: u64,
        /// Suggestion categories raised in the session, comma separated
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,
        /// RFC 3339 timestamp (defaults to now)
        #[arg(long)]
        at: Option<String>,
    },

    /// Summarize a user's history for one skill
    Summary {
        #[arg(long)]
        user: String,
        #[arg(long)]
        skill: String,
        /// Window in days (0 = all history; defaults to config)
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Subcommand)]
enum JourneyAction {
    /// Start (or resume) a transfer journey
    Start {
        #[arg(long)]
        user: String,
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
    },

    /// Mark a step complete
    Step {
        #[arg(long)]
        id: String,
        #[arg(long)]
        step: u32,
        #[arg(long)]
        feedback: Option<String>,
    },

    /// List a user's journeys
    List {
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Validate the catalog and print a short summary
    Check,

    /// Write the catalog as JSON
    Export {
        /// Output file (stdout if omitted)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // stdout carries command output
        .init();

    match cli.command {
        Commands::Init => {
            info!("Initializing SkillMirror");
            storage::init().await?;
        }
        Commands::Status => {
            storage::show_status().await?;
        }
        Commands::Stats => {
            storage::show_stats().await?;
        }
        Commands::Analyze { skill, input, implemented } => {
            let engines = load_engines(cli.catalog.as_deref())?;
            let raw = read_json(&input)?;
            let mut analysis = engines.analyze(&skill, &raw)?;
            for name in &implemented {
                let metric = Metric::parse(name)
                    .with_context(|| format!("Unknown metric: {}", name))?;
                if !analysis.score.mark_implemented(metric) {
                    warn!("No suggestion for {} to mark implemented", metric);
                }
            }
            analysis.comparisons = rank_matches(analysis.comparisons, usize::MAX);
            print_json(&analysis)?;
        }
        Commands::Compare { skill, input, top } => {
            let engines = load_engines(cli.catalog.as_deref())?;
            let raw = read_json(&input)?;
            let snapshot = engines.normalizer.normalize(&skill, &raw)?;
            let ranked = rank_matches(engines.compare(&snapshot), top);
            let matches: Vec<Value> = ranked
                .iter()
                .map(|r| json!({ "comparison": r, "feedback": expert_feedback(r) }))
                .collect();
            print_json(&json!({
                "skill": snapshot.skill(),
                "incomplete": snapshot.incomplete(),
                "matches": matches,
                "experts": recommend_experts(&snapshot, &engines.catalog.patterns, top),
            }))?;
        }
        Commands::Recommend { from, user } => {
            let engines = load_engines(cli.catalog.as_deref())?;
            let sources = from
                .iter()
                .map(|s| parse_skill(s))
                .collect::<Result<BTreeSet<_>>>()?;
            let history = user_history(user.as_deref())?;
            print_json(&engines.transfer.recommend(&sources, &history))?;
        }
        Commands::Path { from, to } => {
            let engines = load_engines(cli.catalog.as_deref())?;
            let rec = engines
                .transfer
                .recommendation(parse_skill(&from)?, parse_skill(&to)?, &UserHistory::default())?;
            let phases = engines.paths.generate(&rec);
            let summary = path_summary(&phases, engines.config.transfer.hours_per_week);
            print_json(&json!({
                "recommendation": rec,
                "summary": summary,
                "phases": phases,
            }))?;
        }
        Commands::Compat { from, to } => {
            let engines = load_engines(cli.catalog.as_deref())?;
            let (source, target) = (parse_skill(&from)?, parse_skill(&to)?);
            match engines.transfer.compatibility(source, target) {
                Some(compat) => print_json(&compat)?,
                None => bail!("No compatibility data for {} -> {}", source, target),
            }
        }
        Commands::Progress { action } => {
            progress_command(action).await?;
        }
        Commands::Session { skill, user, session, input } => {
            let engines = Arc::new(load_engines(cli.catalog.as_deref())?);
            let chunks = match read_json(&input)? {
                Value::Array(chunks) => chunks,
                other => bail!("Session input must be a JSON array of metric maps, got {}", other),
            };
            let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

            let manager = SessionManager::new(engines, open_tracker()?);
            manager.open(&session_id, &user, &skill).await?;
            let mut reports = Vec::with_capacity(chunks.len());
            let mut errors = Vec::new();
            for (index, chunk) in chunks.into_iter().enumerate() {
                match manager.submit(&session_id, chunk).await {
                    Ok(report) => reports.push(report),
                    Err(e) => errors.push(json!({ "chunk_index": index + 1, "error": e.to_string() })),
                }
            }
            // The lane stays open after a rejected chunk, so always end it
            let outcome = manager.end(&session_id).await?;
            print_json(&json!({ "chunks": reports, "errors": errors, "outcome": outcome }))?;
        }
        Commands::Journey { action } => {
            journey_command(action, cli.catalog.as_deref())?;
        }
        Commands::Catalog { action } => {
            let catalog = load_catalog(cli.catalog.as_deref())?;
            match action {
                CatalogAction::Check => {
                    catalog.validate()?;
                    let patterns_per_skill: BTreeMap<&str, usize> = SkillId::ALL
                        .iter()
                        .map(|skill| (skill.as_str(), catalog.patterns_for(*skill).len()))
                        .collect();
                    print_json(&json!({
                        "valid": true,
                        "profiles": catalog.profiles.len(),
                        "patterns": catalog.patterns.len(),
                        "patterns_per_skill": patterns_per_skill,
                        "transfer_groups": catalog.transfers.len(),
                        "metric_vocabulary_version": catalog::METRIC_VOCABULARY_VERSION,
                    }))?;
                }
                CatalogAction::Export { output } => {
                    let json = serde_json::to_string_pretty(&catalog)?;
                    match output {
                        Some(path) => {
                            std::fs::write(&path, json)?;
                            info!("Catalog written to {:?}", path);
                        }
                        None => println!("{}", json),
                    }
                }
            }
        }
        Commands::Bench { markdown } => {
            let engines = load_engines(cli.catalog.as_deref())?;
            let results = bench::run_benchmarks(&engines).await?;
            if markdown {
                println!("{}", results.to_markdown());
            }
        }
    }

    Ok(())
}

async fn progress_command(action: ProgressAction) -> Result<()> {
    let tracker = open_tracker()?;

    match action {
        ProgressAction::Append { user, skill, session, score, duration, categories, at } => {
            if !(0.0..=100.0).contains(&score) {
                bail!("Score must be within 0-100, got {}", score);
            }
            let timestamp = match at {
                Some(text) => DateTime::parse_from_rfc3339(&text)
                    .with_context(|| format!("Invalid timestamp '{}'", text))?
                    .with_timezone(&Utc),
                None => Utc::now(),
            };
            let suggestion_categories = categories
                .iter()
                .filter(|c| !c.trim().is_empty())
                .map(|c| Category::parse(c).with_context(|| format!("Unknown category '{}'", c)))
                .collect::<Result<Vec<_>>>()?;

            let record = ProgressRecord {
                user_id: user,
                skill: parse_skill(&skill)?,
                session_id: session,
                score,
                timestamp,
                duration_seconds: duration,
                suggestion_categories,
            };
            tracker.append(record.clone()).await?;
            print_json(&record)?;
        }
        ProgressAction::Summary { user, skill, days } => {
            let days = match days {
                Some(days) => days,
                None => load_config()?.progress.default_window_days,
            };
            let summary = tracker.summarize(&user, parse_skill(&skill)?, days).await?;
            print_json(&summary)?;
        }
    }
    Ok(())
}

fn journey_command(action: JourneyAction, catalog: Option<&Path>) -> Result<()> {
    let path = storage::get_data_dir()?.join(storage::JOURNEYS_FILE);

    match action {
        JourneyAction::Start { user, from, to } => {
            let engines = load_engines(catalog)?;
            let rec = engines
                .transfer
                .recommendation(parse_skill(&from)?, parse_skill(&to)?, &UserHistory::default())?;

            let mut book = JourneyBook::load(&path)?;
            let (status, journey) =
                book.start(&user, rec.source_skill, rec.target_skill, rec.mappings.len() as u32);
            save_journeys(&book, &path)?;
            print_json(&json!({ "status": status, "journey": journey }))?;
        }
        JourneyAction::Step { id, step, feedback } => {
            let mut book = JourneyBook::load(&path)?;
            let journey = book.complete_step(&id, step, feedback)?;
            save_journeys(&book, &path)?;
            print_json(&journey)?;
        }
        JourneyAction::List { user } => {
            let book = JourneyBook::load(&path)?;
            print_json(&book.for_user(&user))?;
        }
    }
    Ok(())
}

fn save_journeys(book: &JourneyBook, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    book.save(path)?;
    Ok(())
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::load(path).with_context(|| format!("Loading catalog {:?}", path)),
        None => Ok(Catalog::builtin()),
    }
}

fn load_config() -> Result<EngineConfig> {
    let config_path = storage::get_data_dir()?.join(storage::CONFIG_FILE);
    EngineConfig::load(&config_path).with_context(|| format!("Loading configuration {:?}", config_path))
}

/// Build the engines from config.toml and the selected catalog
fn load_engines(catalog: Option<&Path>) -> Result<Engines> {
    Ok(Engines::from_catalog(load_catalog(catalog)?, load_config()?)?)
}

fn open_tracker() -> Result<ProgressTracker> {
    let data_dir = storage::get_data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    let log = SqliteProgressLog::open(&data_dir.join(storage::PROGRESS_DB))?;
    Ok(ProgressTracker::new(Arc::new(log)))
}

fn user_history(user: Option<&str>) -> Result<UserHistory> {
    let Some(user) = user else {
        return Ok(UserHistory::default());
    };
    let book = JourneyBook::load(&storage::get_data_dir()?.join(storage::JOURNEYS_FILE))?;
    Ok(book.history(user))
}

fn parse_skill(name: &str) -> Result<SkillId> {
    SkillId::parse(name).ok_or_else(|| anyhow::anyhow!("Unknown skill '{}'", name))
}

fn read_json(path: &Path) -> Result<Value> {
    let text = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?
    };
    Ok(serde_json::from_str(&text)?)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
