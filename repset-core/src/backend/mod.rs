//! Data access for the hosted backend.
//!
//! The session core only needs a handful of row operations on `workouts`,
//! `workout_exercises`, `workout_logs` and `completed_sets`. Every call
//! returns an explicit [`BackendError`] so loose row shapes never leak into
//! session state.

pub mod memory;
pub mod models;
pub mod rest;

use async_trait::async_trait;

use crate::error::BackendError;
use models::{
    CompletedSetRow, NewWorkoutLog, WorkoutExerciseRow, WorkoutLogRow, WorkoutLogUpdate,
    WorkoutRow,
};

pub use memory::MemoryBackend;
pub use rest::RestBackend;

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_workout(&self, workout_id: &str) -> BackendResult<WorkoutRow>;

    /// Exercises of a workout, ordered by `order_index`.
    async fn fetch_workout_exercises(&self, workout_id: &str)
    -> BackendResult<Vec<WorkoutExerciseRow>>;

    async fn create_workout_log(&self, log: &NewWorkoutLog) -> BackendResult<WorkoutLogRow>;

    async fn update_workout_log(&self, log_id: &str, update: &WorkoutLogUpdate)
    -> BackendResult<()>;

    /// Inserts a completed set. Inserting the same `idempotency_key` twice is a no-op.
    async fn insert_completed_set(&self, set: &CompletedSetRow) -> BackendResult<()>;

    async fn update_exercise_sets(&self, workout_exercise_id: &str, sets: u32)
    -> BackendResult<()>;

    async fn update_workout_rating(&self, workout_id: &str, rating: u8) -> BackendResult<()>;
}
