//! Active-workout session state.
//!
//! [`SessionLoader`] produces a [`WorkoutSession`], [`SessionStore`] owns its
//! synchronous mutations, and [`ActiveWorkout`] ties the store to the
//! backend, local storage, offline queue and autosave.

mod active;
mod loader;
mod model;
mod store;

pub use active::{ActiveWorkout, AutosaveOutcome, CompletedWorkout};
pub use loader::SessionLoader;
pub use model::{InputField, SessionExercise, SetInput, WorkoutSession};
pub use store::{SessionProgress, SessionStore, SetCompletion};

#[cfg(test)]
pub(crate) mod fixtures {
    use super::model::{SessionExercise, SetInput, WorkoutSession};
    use crate::backend::MemoryBackend;
    use crate::backend::models::{WorkoutExerciseRow, WorkoutRow};

    pub fn exercise(id: &str, sets: usize, rest_seconds: Option<u32>) -> SessionExercise {
        SessionExercise {
            workout_exercise_id: format!("we-{}", id),
            exercise_id: id.to_string(),
            name: id.to_uppercase(),
            prescribed_sets: sets as u32,
            rest_seconds,
            completed: vec![false; sets],
            inputs: vec![SetInput::new("0", "10"); sets],
        }
    }

    pub fn session_with(exercises: Vec<SessionExercise>) -> WorkoutSession {
        WorkoutSession::new("w1", exercises)
    }

    /// Squat (3 sets, 80kg x 5, 90s rest) then row (2 sets, no history).
    pub fn seed_workout(backend: &MemoryBackend, workout_id: &str) {
        backend.insert_workout(
            WorkoutRow {
                id: workout_id.to_string(),
                name: "Lower A".into(),
                rating: None,
            },
            vec![
                WorkoutExerciseRow {
                    id: format!("{}-squat", workout_id),
                    workout_id: workout_id.to_string(),
                    exercise_id: "squat".into(),
                    name: "Back Squat".into(),
                    order_index: 0,
                    sets: 3,
                    rest_seconds: Some(90),
                    weight: Some(80.0),
                    reps: Some(5),
                },
                WorkoutExerciseRow {
                    id: format!("{}-row", workout_id),
                    workout_id: workout_id.to_string(),
                    exercise_id: "row".into(),
                    name: "Barbell Row".into(),
                    order_index: 1,
                    sets: 2,
                    rest_seconds: None,
                    weight: None,
                    reps: None,
                },
            ],
        );
    }
}
