use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// Workout template rows
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkoutRow {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub rating: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkoutExerciseRow {
    pub id: String,
    pub workout_id: String,
    pub exercise_id: String,
    pub name: String,
    pub order_index: i32,
    pub sets: u32,
    #[serde(default)]
    pub rest_seconds: Option<u32>,
    /// Last weight used for this exercise, if the user has performed it before.
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
}

impl fmt::Display for WorkoutExerciseRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rest_str = self
            .rest_seconds
            .map(|r| format!(", rest {}s", r))
            .unwrap_or_default();

        write!(f, "#{} {}: {} sets{}", self.order_index, self.name, self.sets, rest_str)
    }
}

// Workout log rows
#[derive(Serialize, Debug, Clone)]
pub struct NewWorkoutLog {
    pub workout_id: String,
    pub started_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WorkoutLogRow {
    pub id: String,
    pub workout_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<u64>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub last_saved_at: Option<DateTime<Utc>>,
}

/// Partial update of a workout log; `None` fields are left untouched.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct WorkoutLogUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_saved_at: Option<DateTime<Utc>>,
}

impl WorkoutLogUpdate {
    pub fn autosave(elapsed_seconds: u64, saved_at: DateTime<Utc>) -> Self {
        Self {
            duration_seconds: Some(elapsed_seconds),
            last_saved_at: Some(saved_at),
            ..Default::default()
        }
    }

    pub fn finalize(elapsed_seconds: u64, rating: u8, completed_at: DateTime<Utc>) -> Self {
        Self {
            completed_at: Some(completed_at),
            duration_seconds: Some(elapsed_seconds),
            rating: Some(rating),
            last_saved_at: Some(completed_at),
        }
    }
}

// Completed set rows
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CompletedSetRow {
    /// Client-generated key; the backend ignores a second insert with the same key.
    pub idempotency_key: String,
    pub workout_id: String,
    pub log_id: Option<String>,
    pub exercise_id: String,
    pub set_order: u32,
    pub reps: u32,
    pub weight: f64,
    pub completed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for CompletedSetRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Exercise {} set {}: {:.1}kg x {} reps",
            self.exercise_id, self.set_order, self.weight, self.reps
        )
    }
}
