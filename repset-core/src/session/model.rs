use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sync::OfflineQueue;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetInput {
    pub weight: String,
    pub reps: String,
}

impl SetInput {
    pub fn new(weight: impl Into<String>, reps: impl Into<String>) -> Self {
        Self {
            weight: weight.into(),
            reps: reps.into(),
        }
    }

    /// Unparseable text counts as zero.
    pub fn weight_value(&self) -> f64 {
        self.weight
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|w| w.is_finite() && *w >= 0.0)
            .unwrap_or(0.0)
    }

    pub fn reps_value(&self) -> u32 {
        self.reps.trim().parse().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Weight,
    Reps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExercise {
    pub workout_exercise_id: String,
    pub exercise_id: String,
    pub name: String,
    pub prescribed_sets: u32,
    pub rest_seconds: Option<u32>,
    pub completed: Vec<bool>,
    pub inputs: Vec<SetInput>,
}

impl SessionExercise {
    pub fn set_count(&self) -> usize {
        self.completed.len()
    }

    pub fn first_incomplete_set(&self) -> Option<usize> {
        self.completed.iter().position(|done| !done)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.iter().filter(|done| **done).count()
    }

    pub fn is_finished(&self) -> bool {
        self.completed.iter().all(|done| *done)
    }
}

/// The in-memory state of one active workout. Serialized as the local
/// recovery snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub workout_id: String,
    pub log_id: Option<String>,
    pub exercises: Vec<SessionExercise>,
    pub current_exercise_index: usize,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    #[serde(default)]
    pub is_paused: bool,
    pub is_resting: bool,
    pub rest_remaining_seconds: u32,
    #[serde(default)]
    pub rest_total_seconds: u32,
    #[serde(default)]
    pub rest_paused: bool,
    #[serde(default)]
    pub offline_queue: OfflineQueue,
    #[serde(default)]
    pub last_saved_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    session: &'a WorkoutSession,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    session: WorkoutSession,
}

impl WorkoutSession {
    pub fn new(workout_id: impl Into<String>, exercises: Vec<SessionExercise>) -> Self {
        Self {
            workout_id: workout_id.into(),
            log_id: None,
            exercises,
            current_exercise_index: 0,
            started_at: Utc::now(),
            elapsed_seconds: 0,
            is_paused: false,
            is_resting: false,
            rest_remaining_seconds: 0,
            rest_total_seconds: 0,
            rest_paused: false,
            offline_queue: OfflineQueue::new(),
            last_saved_at: None,
        }
    }

    pub fn current_exercise(&self) -> Option<&SessionExercise> {
        self.exercises.get(self.current_exercise_index)
    }

    pub fn exercise_position(&self, exercise_id: &str) -> Option<usize> {
        self.exercises
            .iter()
            .position(|e| e.exercise_id == exercise_id)
    }

    pub fn is_last_exercise(&self) -> bool {
        self.current_exercise_index + 1 >= self.exercises.len()
    }

    pub fn to_snapshot(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&SnapshotRef {
            version: SNAPSHOT_VERSION,
            session: self,
        })
    }

    /// Parses a snapshot, rejecting unknown versions and sessions that break
    /// the per-exercise and cursor invariants.
    pub fn from_snapshot(bytes: &[u8]) -> Result<Self, String> {
        let snapshot: Snapshot = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", snapshot.version));
        }
        let session = snapshot.session;
        if session.exercises.is_empty() {
            return Err("snapshot has no exercises".to_string());
        }
        if session.current_exercise_index >= session.exercises.len() {
            return Err(format!(
                "exercise index {} out of range",
                session.current_exercise_index
            ));
        }
        if let Some(bad) = session
            .exercises
            .iter()
            .find(|e| e.completed.len() != e.inputs.len())
        {
            return Err(format!("exercise {} has mismatched set arrays", bad.exercise_id));
        }
        Ok(session)
    }
}
