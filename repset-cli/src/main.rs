use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use log::{LevelFilter, info};

use repset::backend::models::{WorkoutExerciseRow, WorkoutRow};
use repset::backend::{Backend, MemoryBackend, RestBackend};
use repset::config::{BackendConfig, SessionConfig, snapshot_key};
use repset::logging::{init_logger, parse_level};
use repset::scheduler::Scheduler;
use repset::session::{ActiveWorkout, SessionLoader, SetCompletion, WorkoutSession};
use repset::storage::{FileStore, LocalStore, MemoryStore};

#[derive(Parser, Debug)]
#[command(version, about = "Repset - active workout session tools", long_about = None)]
struct Args {
    /// off, error, warn, info, debug or trace
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the recovery snapshot stored for a workout
    Inspect {
        workout_id: String,
        #[arg(short, long, default_value = ".repset")]
        storage: PathBuf,
    },
    /// Send a snapshot's offline queue to the backend configured in the environment
    Flush {
        workout_id: String,
        #[arg(short, long, default_value = ".repset")]
        storage: PathBuf,
    },
    /// Load a workout (snapshot first, then backend) and list its exercises
    Load {
        workout_id: String,
        #[arg(short, long, default_value = ".repset")]
        storage: PathBuf,
    },
    /// Run a scripted workout against the in-memory backend
    Demo {
        /// Drop connectivity before the second set
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let args = Args::parse();
    init_logger(parse_level(&args.log_level).unwrap_or(LevelFilter::Warn));

    match args.command {
        Commands::Inspect {
            workout_id,
            storage,
        } => {
            let store = FileStore::open(&storage).await?;
            match read_snapshot(&store, &workout_id).await? {
                Some(session) => print_session(&session),
                None => println!("No snapshot for workout {}", workout_id),
            }
            Ok(())
        }
        Commands::Flush {
            workout_id,
            storage,
        } => {
            let store = FileStore::open(&storage).await?;
            let mut session = read_snapshot(&store, &workout_id)
                .await?
                .ok_or_else(|| anyhow!("no snapshot for workout {}", workout_id))?;
            if session.offline_queue.is_empty() {
                println!("Nothing to flush");
                return Ok(());
            }

            let backend = RestBackend::new(BackendConfig::from_env()?)?;
            let report = session.offline_queue.flush(&backend).await;
            store
                .set(&snapshot_key(&workout_id), &session.to_snapshot()?)
                .await?;
            println!(
                "Flushed {} writes, {} still pending",
                report.written, report.failed
            );
            Ok(())
        }
        Commands::Load {
            workout_id,
            storage,
        } => {
            let backend: Arc<dyn Backend> = Arc::new(RestBackend::new(BackendConfig::from_env()?)?);
            let store: Arc<dyn LocalStore> = Arc::new(FileStore::open(&storage).await?);
            let session = SessionLoader::new(backend, store, SessionConfig::default())
                .load(&workout_id)
                .await?;
            print_session(&session);
            Ok(())
        }
        Commands::Demo { offline } => run_demo(offline).await,
    }
}

async fn read_snapshot(store: &FileStore, workout_id: &str) -> Result<Option<WorkoutSession>> {
    let Some(bytes) = store.get(&snapshot_key(workout_id)).await? else {
        return Ok(None);
    };
    let session = WorkoutSession::from_snapshot(&bytes)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("snapshot for workout {} is unreadable", workout_id))?;
    Ok(Some(session))
}

fn print_session(session: &WorkoutSession) {
    println!(
        "Workout {} (log {}) elapsed {}s{}",
        session.workout_id,
        session.log_id.as_deref().unwrap_or("-"),
        session.elapsed_seconds,
        if session.is_paused { " [paused]" } else { "" }
    );
    for (i, exercise) in session.exercises.iter().enumerate() {
        let marker = if i == session.current_exercise_index { ">" } else { " " };
        let sets: Vec<String> = exercise
            .inputs
            .iter()
            .zip(&exercise.completed)
            .map(|(input, done)| {
                format!(
                    "{}{}x{}",
                    if *done { "+" } else { "" },
                    input.weight,
                    input.reps
                )
            })
            .collect();
        println!("{} {}: {}", marker, exercise.name, sets.join(" "));
    }
    if session.is_resting {
        println!(
            "Resting: {}/{}s",
            session.rest_remaining_seconds, session.rest_total_seconds
        );
    }
    if !session.offline_queue.is_empty() {
        println!("Pending writes: {}", session.offline_queue.len());
    }
}

fn demo_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.insert_workout(
        WorkoutRow {
            id: "demo".into(),
            name: "Push Day".into(),
            rating: None,
        },
        vec![
            WorkoutExerciseRow {
                id: "demo-bench".into(),
                workout_id: "demo".into(),
                exercise_id: "bench".into(),
                name: "Bench Press".into(),
                order_index: 0,
                sets: 3,
                rest_seconds: Some(3),
                weight: Some(60.0),
                reps: Some(8),
            },
            WorkoutExerciseRow {
                id: "demo-dips".into(),
                workout_id: "demo".into(),
                exercise_id: "dips".into(),
                name: "Dips".into(),
                order_index: 1,
                sets: 2,
                rest_seconds: Some(2),
                weight: None,
                reps: Some(12),
            },
        ],
    );
    backend
}

async fn run_demo(offline: bool) -> Result<()> {
    let backend = Arc::new(demo_backend());
    let local = Arc::new(MemoryStore::new());
    let config = SessionConfig {
        autosave_every_ticks: 5,
        ..SessionConfig::without_delays()
    };
    let workout = Arc::new(ActiveWorkout::start("demo", backend.clone(), local, config).await?);
    let mut events = workout.subscribe();
    let mut scheduler = Scheduler::new(workout.clone());

    let mut sets_done = 0;
    loop {
        if offline && sets_done == 1 {
            workout.set_connectivity(false).await;
        }
        match workout.complete_current_set().await {
            SetCompletion::Completed { .. } => sets_done += 1,
            SetCompletion::AdvancedExercise { .. } => continue,
            SetCompletion::NoChange => break,
        }
        // Let the rest run out on the simulated clock.
        while workout.snapshot().await.is_resting {
            scheduler.tick().await;
        }
        if offline && sets_done == 3 {
            workout.set_connectivity(true).await;
        }
    }

    let done = workout.complete(5).await?;
    while let Ok(event) = events.try_recv() {
        println!("{:?}", event);
    }
    info!("Demo finished after {} ticks", scheduler.ticks());

    println!(
        "Finished in {}s: {}/{} sets, volume {}",
        done.duration_seconds, done.progress.completed_sets, done.progress.total_sets, done.progress.volume
    );
    println!("Backend recorded {} completed sets", backend.completed_sets().len());
    Ok(())
}
