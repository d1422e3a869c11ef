//! Katib Points operator CLI
//!
//! ## Usage
//!
//! ```bash
//! # Authoritative total for one student
//! katib-points points student-42
//!
//! # Repair one student's cached total
//! katib-points reconcile student-42
//!
//! # Repair every student (run after changing point values)
//! katib-points reconcile-all
//!
//! # Top of the leaderboard
//! katib-points leaderboard --limit 20
//!
//! # Record completions by hand
//! katib-points track lesson student-42 topic-3
//! katib-points track activity student-42 topic-3 2
//! katib-points track evaluation student-42 topic-3 8.5
//! katib-points track collaborative student-42 topic-3 dialogue
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use katib_points::{
    leaderboard, CollaborativeKind, Config, EventBus, Reconciler, StudentLocks, TrackOutcome, TrackingDb,
    TrackingRecorder, TrackingStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "katib-points")]
#[command(about = "Student points tracking and reconciliation")]
struct Args {
    /// Path to config file
    #[arg(short, long, env = "KATIB_POINTS_CONFIG")]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "KATIB_POINTS_STORAGE_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a student's reconciled total
    Points { student_id: String },

    /// Reconcile one student's cached total
    Reconcile { student_id: String },

    /// Reconcile every student and print the report
    ReconcileAll,

    /// Print reconciled leaderboard standings
    Leaderboard {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Record a completion event
    Track {
        #[command(subcommand)]
        event: TrackCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TrackCommand {
    Lesson { student_id: String, topic_id: String },
    Activity { student_id: String, topic_id: String, activity_id: u32 },
    Evaluation { student_id: String, topic_id: String, score: f64 },
    Collaborative { student_id: String, topic_id: String, kind: CollaborativeKind },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("katib_points=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path).with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    tokio::fs::create_dir_all(&config.storage_dir).await?;

    let config_path = config.config_path();
    if !config_path.exists() {
        config.save(&config_path)?;
        info!(path = %config_path.display(), "Created default config");
    }

    let db = TrackingDb::open(&config.database_path())?;
    let store: Arc<dyn TrackingStore> = Arc::new(db);

    let events = Arc::new(EventBus::new());
    let _listener = katib_points::events::spawn_logging_listener(events.clone());

    let locks = Arc::new(StudentLocks::new());
    let reconciler = Reconciler::new(store.clone(), config.points)
        .with_locks(locks.clone())
        .with_events(events.clone());

    match args.command {
        Command::Points { student_id } => {
            println!("{}", reconciler.current_points(&student_id).await);
        }
        Command::Reconcile { student_id } => {
            let result = reconciler.reconcile(&student_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::ReconcileAll => {
            let report = reconciler.reconcile_all().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Leaderboard { limit } => {
            let limit = limit.unwrap_or(config.leaderboard_limit);
            let standings = leaderboard::standings(&reconciler, Some(limit)).await?;
            println!("{}", serde_json::to_string_pretty(&standings)?);
        }
        Command::Track { event } => {
            let mut recorder = TrackingRecorder::new(store.clone(), config.points)
                .with_locks(locks.clone())
                .with_events(events.clone());
            if !config.serialize_student_writes {
                recorder = recorder.without_write_serialization();
            }

            let outcome = match event {
                TrackCommand::Lesson { student_id, topic_id } => {
                    recorder.track_lesson_completion(&student_id, &topic_id).await
                }
                TrackCommand::Activity { student_id, topic_id, activity_id } => {
                    recorder.track_activity_submission(&student_id, &topic_id, activity_id).await
                }
                TrackCommand::Evaluation { student_id, topic_id, score } => {
                    recorder.track_evaluation(&student_id, &topic_id, score).await
                }
                TrackCommand::Collaborative { student_id, topic_id, kind } => {
                    recorder.track_collaborative_completion(&student_id, &topic_id, kind).await
                }
            };

            match outcome {
                TrackOutcome::Awarded { points, cached_total } => {
                    println!("awarded {} (cached total {})", points, cached_total)
                }
                TrackOutcome::AlreadyCounted => println!("already counted"),
                TrackOutcome::Failed => println!("not recorded, see log"),
            }
        }
    }

    Ok(())
}
